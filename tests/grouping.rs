//! # Secondary Grouping Tests
//!
//! Covers the optional sort column: bucket construction at load time,
//! insertion-order retrieval, and bucket maintenance across inserts,
//! updates, renames, and removals.

use std::path::PathBuf;

use tempfile::{tempdir, TempDir};

use graindb::{
    ElementRegistry, ElementType, GrainError, GrainFile, Layout, Value,
};

fn tasks_layout() -> Layout {
    Layout::new(&[ElementType::String8, ElementType::String8, ElementType::Int])
}

fn task(key: &str, group: &str, priority: i32) -> Vec<Value> {
    vec![
        Value::String(key.into()),
        Value::String(group.into()),
        Value::Int(priority),
    ]
}

/// Store keyed on column 0 and grouped on column 1, seeded with three
/// tasks: t1 and t3 in group "A", t2 in group "B".
fn grouped_store() -> (TempDir, PathBuf, GrainFile) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tasks.gdb");

    let db = GrainFile::new(&path, ElementRegistry::standard());
    db.create_new(tasks_layout(), 0, Some(1)).unwrap();
    db.bind().unwrap();
    db.add_line(&task("t1", "A", 1)).unwrap();
    db.add_line(&task("t2", "B", 2)).unwrap();
    db.add_line(&task("t3", "A", 3)).unwrap();

    (dir, path, db)
}

fn keys_of(lines: &[graindb::Line]) -> Vec<&str> {
    lines.iter().map(|l| l.key()).collect()
}

mod retrieval {
    use super::*;

    #[test]
    fn groups_return_members_in_insertion_order() {
        let (_dir, _path, db) = grouped_store();

        let group_a = db.get_sorted_lines("A").unwrap();
        assert_eq!(keys_of(&group_a), ["t1", "t3"]);
        assert_eq!(group_a[0].sort_key(), Some("A"));

        let group_b = db.get_sorted_lines("B").unwrap();
        assert_eq!(keys_of(&group_b), ["t2"]);
    }

    #[test]
    fn absent_group_is_empty_not_an_error() {
        let (_dir, _path, db) = grouped_store();
        assert!(db.get_sorted_lines("Z").unwrap().is_empty());
    }

    #[test]
    fn result_is_an_independent_snapshot() {
        let (_dir, _path, db) = grouped_store();

        let mut snapshot = db.get_sorted_lines("A").unwrap();
        snapshot.clear();

        assert_eq!(db.get_sorted_lines("A").unwrap().len(), 2);
    }

    #[test]
    fn ungrouped_store_reports_not_sorted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("flat.gdb");

        let db = GrainFile::new(&path, ElementRegistry::standard());
        db.create_new(tasks_layout(), 0, None).unwrap();

        assert!(matches!(
            db.get_sorted_lines("A"),
            Err(GrainError::NotSorted)
        ));
    }

    #[test]
    fn sort_column_must_be_string_typed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("badsort.gdb");

        let db = GrainFile::new(&path, ElementRegistry::standard());
        assert!(matches!(
            db.create_new(tasks_layout(), 0, Some(2)),
            Err(GrainError::NotIndexable(2))
        ));
    }
}

mod maintenance {
    use super::*;

    #[test]
    fn removal_leaves_the_bucket() {
        let (_dir, _path, db) = grouped_store();

        db.remove_line("t1", true).unwrap();

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t3"]);
        assert_eq!(db.get_sorted_lines("B").unwrap().len(), 1);
    }

    #[test]
    fn single_field_group_change_moves_the_member() {
        let (_dir, _path, db) = grouped_store();

        db.update_object("t1", 1, &Value::String("B".into())).unwrap();

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t3"]);
        assert_eq!(keys_of(&db.get_sorted_lines("B").unwrap()), ["t2", "t1"]);
        assert_eq!(db.get_line("t1").unwrap().sort_key(), Some("B"));
    }

    #[test]
    fn full_row_group_change_moves_the_member() {
        let (_dir, _path, db) = grouped_store();

        db.update_line("t3", &task("t3", "B", 99)).unwrap();

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t1"]);
        assert_eq!(keys_of(&db.get_sorted_lines("B").unwrap()), ["t2", "t3"]);
    }

    #[test]
    fn key_rename_keeps_group_membership() {
        let (_dir, _path, db) = grouped_store();

        assert!(db.update_line("t1", &task("t9", "A", 1)).unwrap());

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t9", "t3"]);
    }

    #[test]
    fn new_members_append_to_their_bucket() {
        let (_dir, _path, db) = grouped_store();

        db.add_line(&task("t4", "A", 4)).unwrap();

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t1", "t3", "t4"]);
    }
}

mod persistence {
    use super::*;

    #[test]
    fn buckets_are_rebuilt_on_reload() {
        let (_dir, path, db) = grouped_store();
        db.update_object("t1", 1, &Value::String("B".into())).unwrap();
        db.unbind().unwrap();
        drop(db);

        let db = GrainFile::new(&path, ElementRegistry::standard());
        let recommended = db.initialize().unwrap();
        db.load(recommended, Some(1)).unwrap();

        assert_eq!(keys_of(&db.get_sorted_lines("A").unwrap()), ["t3"]);
        assert_eq!(keys_of(&db.get_sorted_lines("B").unwrap()), ["t2", "t1"]);
    }

    #[test]
    fn loading_without_a_sort_column_drops_the_groups() {
        let (_dir, path, db) = grouped_store();
        db.unbind().unwrap();
        drop(db);

        let db = GrainFile::new(&path, ElementRegistry::standard());
        let recommended = db.initialize().unwrap();
        db.load(recommended, None).unwrap();

        assert!(matches!(
            db.get_sorted_lines("A"),
            Err(GrainError::NotSorted)
        ));
        assert!(db.contains_key("t1"));
    }
}
