use ruleguide::{
    var, Facts, Outcome, RuleNode, RuleStore, RulesEngine, StoreError, StoreOptions,
};

fn leaf(name: &str, word: &str, page: u32) -> RuleNode {
    RuleNode::new(name).when(var("query").find(word)).with_page(page)
}

/// root
/// ├── a
/// │   └── a1
/// └── b
fn three_level() -> RuleNode {
    leaf("root", "help", 1)
        .with_prompt("Be helpful.")
        .with_salience(2)
        .with_child(leaf("a", "billing", 2).with_child(leaf("a1", "refund", 3)))
        .with_child(leaf("b", "shipping", 4))
}

fn shape(node: &RuleNode) -> String {
    if node.children().is_empty() {
        node.name.clone()
    } else {
        let kids: Vec<String> = node.children().iter().map(shape).collect();
        format!("{}({})", node.name, kids.join(","))
    }
}

fn parent_of(store: &RuleStore, id: i64) -> Option<i64> {
    store
        .connection()
        .query_row("SELECT parent_id FROM rules WHERE id = ?1", [id], |row| row.get(0))
        .unwrap()
}

fn id_of(store: &RuleStore, name: &str) -> i64 {
    store
        .connection()
        .query_row("SELECT id FROM rules WHERE name = ?1", [name], |row| row.get(0))
        .unwrap()
}

#[test]
fn empty_store_loads_nothing() -> Result<(), StoreError> {
    let store = RuleStore::open_in_memory()?;
    assert_eq!(store.count()?, 0);
    assert!(store.load_all()?.is_empty());
    assert!(store.load_roots()?.is_empty());
    Ok(())
}

#[test]
fn insert_root_round_trips_tree_shape() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let tree = three_level();
    let id = store.insert_root(&tree)?;
    assert_eq!(store.count()?, 4);

    let roots = store.load_roots()?;
    assert_eq!(roots.len(), 1);
    assert_eq!(shape(&roots[0]), "root(a(a1),b)");

    let root = &roots[0];
    assert_eq!(root.conditions, tree.conditions);
    assert_eq!(root.outcome, Outcome::page(1).with_prompt("Be helpful."));
    assert_eq!(root.salience, 2);

    let all = store.load_all()?;
    assert_eq!(all.len(), 4);
    assert_eq!(all[0].id, id);
    assert_eq!(all[0].parent, None);
    assert!(all[1..].iter().all(|e| e.parent.is_some()));
    Ok(())
}

#[test]
fn stored_forest_evaluates_like_built_forest() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    store.insert_root(&leaf("other", "weather", 9).with_salience(-1))?;

    let built = RulesEngine::new().with_roots([three_level(), leaf("other", "weather", 9).with_salience(-1)]);
    let loaded = RulesEngine::new().with_roots(store.load_roots()?);
    for query in ["help with billing refund", "help shipping", "weather help", "nothing"] {
        let facts = Facts::query(query);
        assert_eq!(loaded.evaluate(&facts), built.evaluate(&facts), "{query}");
    }
    Ok(())
}

#[test]
fn loaded_ties_go_to_latest_inserted_row() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let r = store.insert_root(&leaf("r", "help", 1).with_salience(-1))?;
    let b = store.insert_child(&leaf("b", "help", 2), r)?;
    store.insert_child(&leaf("c", "help", 3), b)?;

    let loaded = RulesEngine::new().with_roots(store.load_roots()?);
    let facts = Facts::query("help");
    assert_eq!(loaded.evaluate(&facts), Ok(Some(Outcome::page(3))));

    // Loading twice gives the same winner.
    let reloaded = RulesEngine::new().with_roots(store.load_roots()?);
    assert_eq!(reloaded.evaluate(&facts), Ok(Some(Outcome::page(3))));

    assert_eq!(
        ruleguide::guidance::route_stored(&store, "help")?,
        ruleguide::Retrieval::Guided { page: Some(3), prompt: None }
    );
    Ok(())
}

#[test]
fn empty_outcome_is_stored_as_sentinels() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let id = store.insert_root(&RuleNode::new("bare"))?;
    let (prompt, page): (String, i64) = store.connection().query_row(
        "SELECT prompt, page FROM rules WHERE id = ?1",
        [id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    assert_eq!(prompt, "");
    assert_eq!(page, 0);
    assert_eq!(store.load_roots()?[0].outcome, Outcome::default());
    Ok(())
}

#[test]
fn insert_child_keeps_nesting() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let root = store.insert_root(&leaf("root", "help", 1))?;
    let child = store.insert_child(&leaf("a", "billing", 2).with_child(leaf("a1", "refund", 3)), root)?;

    assert_eq!(parent_of(&store, child), Some(root));
    assert_eq!(parent_of(&store, id_of(&store, "a1")), Some(child));
    assert_eq!(shape(&store.load_roots()?[0]), "root(a(a1))");
    Ok(())
}

#[test]
fn insert_child_with_unknown_parent_writes_nothing() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&leaf("root", "help", 1))?;

    let err = store.insert_child(&three_level(), 999).unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)), "{err}");
    assert_eq!(store.count()?, 1);
    Ok(())
}

#[test]
fn update_overwrites_fields_and_moves() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let b = id_of(&store, "b");
    let a = id_of(&store, "a");

    let fields = leaf("b2", "delivery", 40).with_salience(7).with_prompt("Track it.");
    store.update(b, &fields, Some(a))?;

    let subtree = store.load_subtree(a)?;
    let moved = subtree.iter().find(|e| e.id == b).unwrap();
    assert_eq!(moved.parent, Some(a));
    assert_eq!(moved.rule.name, "b2");
    assert_eq!(moved.rule.salience, 7);
    assert_eq!(moved.rule.outcome, Outcome::page(40).with_prompt("Track it."));
    assert_eq!(moved.rule.conditions, vec![var("query").find("delivery")]);
    Ok(())
}

#[test]
fn update_with_none_detaches_to_root() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let a = id_of(&store, "a");

    store.update(a, &leaf("a", "billing", 2), None)?;
    assert_eq!(parent_of(&store, a), None);

    let mut names: Vec<String> = store.load_roots()?.iter().map(shape).collect();
    names.sort();
    assert_eq!(names, vec!["a(a1)", "root(b)"]);
    Ok(())
}

#[test]
fn update_into_own_subtree_is_rejected() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let a = id_of(&store, "a");
    let a1 = id_of(&store, "a1");
    let root = id_of(&store, "root");

    for target in [a, a1] {
        let err = store.update(a, &leaf("renamed", "x", 1), Some(target)).unwrap_err();
        assert!(
            matches!(err, StoreError::Cycle { id, parent } if id == a && parent == target),
            "{err}"
        );
    }
    assert_eq!(parent_of(&store, a), Some(root));
    assert!(store.load_all()?.iter().all(|e| e.rule.name != "renamed"));
    Ok(())
}

#[test]
fn update_missing_rule_is_not_found() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let err = store.update(42, &leaf("x", "x", 1), None).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { id: 42 }));
    Ok(())
}

#[test]
fn remove_reparents_children() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let root = id_of(&store, "root");
    let a = id_of(&store, "a");
    let a1 = id_of(&store, "a1");

    let moved = store.remove(a, Some(root))?;
    assert_eq!(moved, 1);
    assert_eq!(parent_of(&store, a1), Some(root));

    let dangling: i64 = store.connection().query_row(
        "SELECT COUNT(*) FROM rules WHERE parent_id = ?1",
        [a],
        |row| row.get(0),
    )?;
    assert_eq!(dangling, 0);
    assert_eq!(shape(&store.load_roots()?[0]), "root(a1,b)");
    Ok(())
}

#[test]
fn remove_with_none_promotes_children_to_roots() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let root = id_of(&store, "root");

    assert_eq!(store.remove(root, None)?, 2);
    let mut names: Vec<String> = store.load_roots()?.iter().map(shape).collect();
    names.sort();
    assert_eq!(names, vec!["a(a1)", "b"]);
    Ok(())
}

#[test]
fn remove_with_invalid_parent_rolls_back() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let a = id_of(&store, "a");
    let a1 = id_of(&store, "a1");

    let err = store.remove(a, Some(12_345)).unwrap_err();
    assert!(matches!(err, StoreError::Sqlite(_)), "{err}");
    assert_eq!(store.count()?, 4);
    assert_eq!(parent_of(&store, a1), Some(a));

    let err = store.remove(a, Some(a1)).unwrap_err();
    assert!(matches!(err, StoreError::Cycle { .. }), "{err}");
    assert_eq!(store.count()?, 4);
    Ok(())
}

#[test]
fn remove_missing_rule_is_not_found() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    assert!(matches!(
        store.remove(7, None),
        Err(StoreError::NotFound { id: 7 })
    ));
    Ok(())
}

#[test]
fn delete_promotes_to_own_parent() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let root = id_of(&store, "root");
    let a = id_of(&store, "a");
    let a1 = id_of(&store, "a1");

    assert_eq!(store.delete(a)?, 1);
    assert_eq!(parent_of(&store, a1), Some(root));
    assert_eq!(store.count()?, 3);
    assert!(matches!(store.delete(a), Err(StoreError::NotFound { .. })));
    Ok(())
}

#[test]
fn detach_moves_subtree_to_root() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    store.detach(id_of(&store, "a"))?;

    let mut names: Vec<String> = store.load_roots()?.iter().map(shape).collect();
    names.sort();
    assert_eq!(names, vec!["a(a1)", "root(b)"]);
    assert!(matches!(store.detach(999), Err(StoreError::NotFound { id: 999 })));
    Ok(())
}

#[test]
fn load_subtree_is_seeded_at_id() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    let a = id_of(&store, "a");

    let subtree = store.load_subtree(a)?;
    let names: Vec<&str> = subtree.iter().map(|e| e.rule.name.as_str()).collect();
    assert_eq!(names, vec!["a", "a1"]);
    assert_eq!(shape(&subtree[0].rule), "a(a1)");
    assert!(subtree[0].parent.is_some());

    assert!(store.load_subtree(999)?.is_empty());
    Ok(())
}

#[test]
fn clear_empties_table_and_restarts() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    store.insert_root(&three_level())?;
    store.clear()?;
    assert_eq!(store.count()?, 0);

    let id = store.insert_root(&leaf("fresh", "x", 1))?;
    assert_eq!(id, 1);
    Ok(())
}

#[test]
fn corrupt_conditions_surface_as_encoding_error() -> Result<(), StoreError> {
    let mut store = RuleStore::open_in_memory()?;
    let id = store.insert_root(&leaf("r", "x", 1))?;
    store
        .connection()
        .execute("UPDATE rules SET conditions = 'nope' WHERE id = ?1", [id])?;
    assert!(matches!(store.load_roots(), Err(StoreError::Encoding(_))));
    Ok(())
}

#[test]
fn file_database_persists_across_reopen() -> Result<(), StoreError> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.db");

    {
        let mut store = RuleStore::open(&path)?;
        store.insert_root(&three_level())?;
    }

    let options = StoreOptions::new().busy_timeout(std::time::Duration::from_millis(250));
    let store = RuleStore::open_with(&path, &options)?;
    assert_eq!(store.count()?, 4);
    assert_eq!(shape(&store.load_roots()?[0]), "root(a(a1),b)");
    Ok(())
}

#[test]
fn from_connection_uses_callers_handle() -> Result<(), StoreError> {
    let conn = rusqlite::Connection::open_in_memory()?;
    let store = RuleStore::from_connection(conn, &StoreOptions::default())?;
    store.init_schema()?;
    assert_eq!(store.count()?, 0);

    let conn = store.into_connection();
    let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    assert_eq!(fk, 1);
    Ok(())
}
