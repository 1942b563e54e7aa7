// ═══════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════
mod record_tests {
    use crate::db::RecordStore;
    use crate::error::RecordError;
    use crate::record::Record;
    use crate::schema::Schema;
    use crate::spooky_fields;
    use crate::spooky_value::SpookyValue;
    use crate::tracker::{ChangeTracked, FieldChange};
    use crate::types::FastHashSet;
    use smol_str::SmolStr;
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    struct Fixture {
        // keeps the database file alive
        _file: NamedTempFile,
        store: RecordStore,
        schema: Arc<Schema>,
    }

    fn tracked_schema() -> Arc<Schema> {
        Arc::new(
            Schema::new("tracked")
                .unwrap()
                .field("name", "")
                .field("value", SpookyValue::Null)
                .field("tags", Vec::<SpookyValue>::new())
                .auto_now("modified_at"),
        )
    }

    fn fixture() -> Fixture {
        let file = NamedTempFile::new().unwrap();
        let store = RecordStore::open(file.path()).unwrap();
        Fixture {
            _file: file,
            store,
            schema: tracked_schema(),
        }
    }

    fn names(items: &[&str]) -> FastHashSet<SmolStr> {
        items.iter().map(|s| SmolStr::new(s)).collect()
    }

    fn change(old: impl Into<SpookyValue>, new: impl Into<SpookyValue>) -> FieldChange<SpookyValue> {
        FieldChange::new(old.into(), new.into())
    }

    fn create_hello(f: &Fixture) -> Record {
        Record::create(&f.store, &f.schema, spooky_fields! { "name" => "hello" }).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Unsaved changes
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_no_unsaved_changes_after_create() {
        let f = fixture();
        let obj = create_hello(&f);
        assert!(!obj.has_unsaved_changes().unwrap());
        assert_eq!(obj.id(), Some(1));
    }

    #[test]
    fn test_detects_unsaved_change() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        assert!(obj.has_unsaved_changes().unwrap());
        assert!(obj.unsaved_fields().unwrap().contains("name"));
    }

    #[test]
    fn test_no_unsaved_changes_after_save() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        obj.save(&f.store).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_setting_same_value_is_not_a_change() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "hello").unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_tracks_json_field_changes() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("tags", vec!["a", "b"]).unwrap();
        assert!(obj.has_unsaved_changes().unwrap());
        assert!(obj.unsaved_fields().unwrap().contains("tags"));
    }

    #[test]
    fn test_equal_container_after_reload_is_not_a_change() {
        let f = fixture();
        let mut obj = Record::create(
            &f.store,
            &f.schema,
            spooky_fields! { "name" => "hello", "tags" => vec!["a", "b"] },
        )
        .unwrap();
        let mut loaded = Record::load(&f.store, &f.schema, obj.id().unwrap()).unwrap();

        obj.set("tags", vec!["a", "b"]).unwrap();
        loaded.set("tags", vec!["a", "b"]).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
        assert!(!loaded.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_unsaved_field_diff() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        assert_eq!(
            obj.get_unsaved_field_diff("name").unwrap(),
            Some(change("hello", "world"))
        );
    }

    #[test]
    fn test_unsaved_field_diff_returns_none_for_unchanged() {
        let f = fixture();
        let obj = create_hello(&f);
        assert_eq!(obj.get_unsaved_field_diff("name").unwrap(), None);
        assert_eq!(obj.get_unsaved_field_diff("nonexistent").unwrap(), None);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Recent updates
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_recent_updates_after_save() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        obj.save(&f.store).unwrap();

        assert!(obj.has_updated_fields());
        assert_eq!(obj.updated_fields(), names(&["name", "modified_at"]));
        let (old, new) = obj.recent_updates().remove("name").unwrap().into_pair();
        assert_eq!(old, SpookyValue::from("hello"));
        assert_eq!(new, SpookyValue::from("world"));
    }

    #[test]
    fn test_only_auto_fields_in_recent_updates_when_nothing_changed() {
        let f = fixture();
        let mut obj = create_hello(&f);
        assert!(!obj.unsaved_fields().unwrap().contains("modified_at"));

        obj.save(&f.store).unwrap();
        assert_eq!(obj.updated_fields(), names(&["modified_at"]));
        assert!(!obj.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_first_save_reports_id_and_stamp() {
        let f = fixture();
        let obj = create_hello(&f);
        assert_eq!(obj.updated_fields(), names(&["id", "modified_at"]));
        assert_eq!(
            obj.recent_updates().get("id"),
            Some(&change(SpookyValue::Null, 1u64))
        );
    }

    #[test]
    fn test_scenario_without_auto_fields() {
        let f = fixture();
        let schema = Arc::new(Schema::new("plain").unwrap().field("name", ""));
        let mut obj = Record::create(&f.store, &schema, spooky_fields! { "name" => "hello" }).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());

        obj.set("name", "world").unwrap();
        assert_eq!(obj.unsaved_fields().unwrap(), names(&["name"]));
        assert_eq!(
            obj.get_unsaved_field_diff("name").unwrap(),
            Some(change("hello", "world"))
        );

        obj.save(&f.store).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
        assert_eq!(obj.updated_fields(), names(&["name"]));
        assert_eq!(obj.recent_updates().get("name"), Some(&change("hello", "world")));

        // nothing to report on a no-op save without host-managed fields
        obj.save(&f.store).unwrap();
        assert!(!obj.has_updated_fields());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reload
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_reset_after_refresh() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        assert!(obj.has_unsaved_changes().unwrap());

        obj.refresh(&f.store).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
        assert_eq!(obj.get("name"), Some(&SpookyValue::from("hello")));
    }

    #[test]
    fn test_refresh_discards_recent_updates() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        obj.save(&f.store).unwrap();
        assert!(obj.has_updated_fields());

        obj.set("name", "edited").unwrap();
        obj.refresh(&f.store).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());
        assert!(!obj.has_updated_fields());
        assert_eq!(obj.get("name"), Some(&SpookyValue::from("world")));
    }

    #[test]
    fn test_refresh_unsaved_record_fails() {
        let f = fixture();
        let mut obj = Record::new(&f.schema, spooky_fields! { "name" => "x" }).unwrap();
        assert!(matches!(obj.refresh(&f.store), Err(RecordError::NotSaved { .. })));
    }

    #[test]
    fn test_loaded_integer_id_matches_saved() {
        let f = fixture();
        let obj = Record::create(&f.store, &f.schema, spooky_fields! { "value" => 5u64 }).unwrap();
        let mut loaded = Record::load(&f.store, &f.schema, obj.id().unwrap()).unwrap();
        assert!(!loaded.has_unsaved_changes().unwrap());

        // written as U64, read back as I64: same number, no change
        loaded.set("value", 5u64).unwrap();
        assert!(!loaded.has_unsaved_changes().unwrap());
        loaded.set("value", 6u64).unwrap();
        assert_eq!(loaded.unsaved_fields().unwrap(), names(&["value"]));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // get_or_create / deferred fields
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_get_or_create_existing_has_no_changes() {
        let f = fixture();
        create_hello(&f);
        let (obj, created) =
            Record::get_or_create(&f.store, &f.schema, "name", "hello", spooky_fields! {}).unwrap();
        assert!(!created);
        assert!(!obj.has_unsaved_changes().unwrap());
        assert!(!obj.has_updated_fields());
    }

    #[test]
    fn test_get_or_create_missing_creates() {
        let f = fixture();
        let (obj, created) = Record::get_or_create(
            &f.store,
            &f.schema,
            "name",
            "fresh",
            spooky_fields! { "value" => 3i64 },
        )
        .unwrap();
        assert!(created);
        assert_eq!(obj.get("value"), Some(&SpookyValue::from(3i64)));
        assert!(!obj.has_unsaved_changes().unwrap());
        assert!(obj.updated_fields().contains("id"));
    }

    #[test]
    fn test_deferred_fields_not_tracked() {
        let f = fixture();
        let id = create_hello(&f).id().unwrap();
        let mut obj = Record::load_deferred(&f.store, &f.schema, id, &["name"]).unwrap();
        assert!(obj.is_deferred("name"));
        assert!(!obj.unsaved_changes().unwrap().contains("name"));

        obj.set("name", "world").unwrap();
        assert!(!obj.unsaved_changes().unwrap().contains("name"));
    }

    #[test]
    fn test_fetch_deferred_keeps_baseline() {
        let f = fixture();
        let id = create_hello(&f).id().unwrap();
        let mut obj = Record::load_deferred(&f.store, &f.schema, id, &["name"]).unwrap();

        assert_eq!(obj.fetch_deferred(&f.store, "name").unwrap(), &SpookyValue::from("hello"));
        assert!(!obj.is_deferred("name"));
        obj.set("name", "world").unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());

        // after the next sync point the field is tracked
        obj.save(&f.store).unwrap();
        obj.set("name", "again").unwrap();
        assert_eq!(obj.unsaved_fields().unwrap(), names(&["name"]));
    }

    #[test]
    fn test_save_with_deferred_field_keeps_stored_value() {
        let f = fixture();
        let id = create_hello(&f).id().unwrap();
        let mut obj = Record::load_deferred(&f.store, &f.schema, id, &["name"]).unwrap();
        obj.set("value", 9i64).unwrap();
        obj.save(&f.store).unwrap();

        let reloaded = Record::load(&f.store, &f.schema, id).unwrap();
        assert_eq!(reloaded.get("name"), Some(&SpookyValue::from("hello")));
        assert_eq!(reloaded.get("value"), Some(&SpookyValue::from(9i64)));
        assert!(obj.is_deferred("name"));
    }

    #[test]
    fn test_nan_field_is_not_a_change() {
        let f = fixture();
        let mut obj = Record::new(&f.schema, spooky_fields! { "value" => f64::NAN }).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());

        obj.save(&f.store).unwrap();
        assert!(obj.unsaved_fields().unwrap().is_empty());

        obj.refresh(&f.store).unwrap();
        assert!(!obj.has_unsaved_changes().unwrap());

        obj.set("value", 1.5).unwrap();
        assert_eq!(obj.unsaved_fields().unwrap(), names(&["value"]));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Failures
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_failed_save_leaves_tracker_unchanged() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("name", "world").unwrap();
        obj.save(&f.store).unwrap();
        let updates_before = obj.recent_updates();
        let stamp_before = obj.get("modified_at").cloned();

        // the row disappears underneath us
        f.store.delete_row("tracked", obj.id().unwrap()).unwrap();
        obj.set("name", "lost").unwrap();
        let err = obj.save(&f.store).unwrap_err();
        assert!(matches!(err, RecordError::NotFound { .. }));

        assert_eq!(obj.recent_updates(), updates_before);
        assert_eq!(obj.get("modified_at").cloned(), stamp_before);
        assert_eq!(obj.unsaved_fields().unwrap(), names(&["name"]));
    }

    #[test]
    fn test_stamp_saturates_at_max() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.set("modified_at", u64::MAX).unwrap();
        obj.save(&f.store).unwrap();
        assert_eq!(obj.get("modified_at"), Some(&SpookyValue::from(u64::MAX)));
        assert!(!obj.has_unsaved_changes().unwrap());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let f = fixture();
        let err = Record::new(&f.schema, spooky_fields! { "nope" => 1i64 }).unwrap_err();
        assert!(matches!(err, RecordError::UnknownField { .. }));

        let mut obj = create_hello(&f);
        assert!(matches!(obj.set("nope", 1i64), Err(RecordError::UnknownField { .. })));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Foreign keys
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_foreign_key_tracked_by_attname() {
        let f = fixture();
        let venues = Arc::new(Schema::new("venue").unwrap().field("city", ""));
        let events = Arc::new(
            Schema::new("event")
                .unwrap()
                .field("title", "")
                .foreign_key("venue", "venue"),
        );

        let berlin = Record::create(&f.store, &venues, spooky_fields! { "city" => "Berlin" }).unwrap();
        let paris = Record::create(&f.store, &venues, spooky_fields! { "city" => "Paris" }).unwrap();

        let mut event = Record::new(&events, spooky_fields! { "title" => "launch" }).unwrap();
        event.set_related("venue", &berlin).unwrap();
        event.save(&f.store).unwrap();
        assert_eq!(event.related_id("venue").unwrap(), berlin.id());

        event.set_related("venue", &paris).unwrap();
        assert_eq!(event.unsaved_fields().unwrap(), names(&["venue_id"]));
        assert_eq!(
            event.get_unsaved_field_diff("venue_id").unwrap(),
            Some(change(berlin.id(), paris.id()))
        );

        assert!(matches!(
            event.related_id("title"),
            Err(RecordError::NotForeignKey { .. })
        ));
    }

    #[test]
    fn test_set_related_requires_saved_target() {
        let f = fixture();
        let venues = Arc::new(Schema::new("venue").unwrap());
        let events = Arc::new(Schema::new("event").unwrap().foreign_key("venue", "venue"));

        let unsaved = Record::new(&venues, spooky_fields! {}).unwrap();
        let mut event = Record::create(&f.store, &events, spooky_fields! {}).unwrap();
        assert!(matches!(
            event.set_related("venue", &unsaved),
            Err(RecordError::NotSaved { .. })
        ));
    }

    #[test]
    fn test_create_with_explicit_id_inserts() {
        let f = fixture();
        let obj = Record::create(
            &f.store,
            &f.schema,
            spooky_fields! { "id" => 5u64, "name" => "x" },
        )
        .unwrap();
        assert_eq!(obj.id(), Some(5));
        assert!(!obj.has_unsaved_changes().unwrap());

        let loaded = Record::load(&f.store, &f.schema, 5).unwrap();
        assert_eq!(loaded.get("name"), Some(&SpookyValue::from("x")));

        // the sequence continues past the explicit id
        assert_eq!(create_hello(&f).id(), Some(6));
    }

    #[test]
    fn test_create_with_taken_id_fails() {
        let f = fixture();
        let first = create_hello(&f);
        let err = Record::create(
            &f.store,
            &f.schema,
            spooky_fields! { "id" => first.id(), "name" => "dup" },
        )
        .unwrap_err();
        assert!(matches!(err, RecordError::AlreadyExists { id: 1, .. }));

        let stored = Record::load(&f.store, &f.schema, 1).unwrap();
        assert_eq!(stored.get("name"), Some(&SpookyValue::from("hello")));
    }

    #[test]
    fn test_unsaved_record_with_id_cannot_refresh() {
        let f = fixture();
        let mut obj = Record::new(&f.schema, spooky_fields! { "id" => 3u64 }).unwrap();
        assert!(matches!(obj.refresh(&f.store), Err(RecordError::NotSaved { .. })));
    }

    #[test]
    fn test_save_after_delete_inserts_again() {
        let f = fixture();
        let mut obj = create_hello(&f);
        obj.delete(&f.store).unwrap();
        obj.save(&f.store).unwrap();
        assert_eq!(obj.id(), Some(2));
        assert!(Record::load(&f.store, &f.schema, 2).is_ok());
    }

    #[test]
    fn test_delete_clears_id() {
        let f = fixture();
        let mut obj = create_hello(&f);
        assert!(obj.delete(&f.store).unwrap());
        assert_eq!(obj.id(), None);
        assert!(matches!(
            Record::load(&f.store, &f.schema, 1),
            Err(RecordError::NotFound { id: 1, .. })
        ));
    }
}
