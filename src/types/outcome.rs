use std::fmt;

/// What a winning rule proposes to the retrieval flow: a page to read
/// and/or an instruction prompt. Either part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct Outcome {
    pub page: Option<u32>,
    pub prompt: Option<String>,
}

impl Outcome {
    pub fn new(page: Option<u32>, prompt: Option<String>) -> Self {
        Self { page, prompt }
    }

    pub fn page(page: u32) -> Self {
        Self::new(Some(page), None)
    }

    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self::new(None, Some(prompt.into()))
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.page.is_none() && self.prompt.is_none()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.page, &self.prompt) {
            (Some(page), Some(prompt)) => write!(f, "page {page}, prompt \"{prompt}\""),
            (Some(page), None) => write!(f, "page {page}"),
            (None, Some(prompt)) => write!(f, "prompt \"{prompt}\""),
            (None, None) => write!(f, "no outcome"),
        }
    }
}
