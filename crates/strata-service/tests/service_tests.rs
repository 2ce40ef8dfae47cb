use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;
use strata_scopes::{CustomizerRegistry, LocalStorage, Locations};
use strata_service::{LegacyPreferences, PreferencesService};
use strata_test_utils::{locations_under, memory_tree, standard_tree};

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_string()).collect()
}

#[test]
fn most_specific_scope_wins() {
    let (tree, _storage) = memory_tree();
    tree.node("/default/app").unwrap().put("color", "black").unwrap();
    tree.node("/configuration/app").unwrap().put("color", "red").unwrap();
    tree.node("/instance/app").unwrap().put("color", "blue").unwrap();
    let service = PreferencesService::new(tree.clone());

    assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "blue");
    tree.node("/instance/app").unwrap().remove("color").unwrap();
    assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "red");
    tree.node("/configuration/app").unwrap().remove("color").unwrap();
    assert_eq!(service.get_string("app", "color", "none", &[]).unwrap(), "black");
}

#[test]
fn key_lookup_order_overrides_default_order() {
    let (tree, _storage) = memory_tree();
    tree.node("/default/app").unwrap().put("color", "black").unwrap();
    tree.node("/instance/app").unwrap().put("color", "blue").unwrap();
    let service = PreferencesService::new(tree);

    service
        .set_lookup_order("app", Some("color"), Some(strings(&["default", "instance"])))
        .unwrap();
    assert_eq!(service.get("app", "color", &[]).unwrap().as_deref(), Some("black"));
    assert_eq!(
        service.lookup_order("app", Some("color")),
        Some(strings(&["default", "instance"]))
    );

    service.set_lookup_order("app", Some("color"), None).unwrap();
    assert_eq!(service.get("app", "color", &[]).unwrap().as_deref(), Some("blue"));
}

#[test]
fn default_order_from_configuration_file() {
    let (tree, _storage) = memory_tree();
    tree.node("/instance/app").unwrap().put("k", "instance").unwrap();
    tree.node("/user/app").unwrap().put("k", "user").unwrap();

    let locations = Locations::from_toml_str("default_lookup_order = [\"user\", \"instance\"]\n").unwrap();
    let service = PreferencesService::from_locations(tree, &locations).unwrap();
    assert_eq!(service.get("app", "k", &[]).unwrap().as_deref(), Some("user"));
}

#[test]
fn export_import_round_trip() {
    let (tree, storage) = memory_tree();
    let service = PreferencesService::new(tree.clone());
    let app = tree.node("/instance/app").unwrap();
    app.put("color", "blue").unwrap();
    app.node("editor").unwrap().put("a/b", "x").unwrap();

    let mut exported = Vec::new();
    assert_eq!(service.export_preferences(&app, &mut exported, &[]).unwrap(), 2);

    app.remove_node().unwrap();
    let status = service.import_preferences(&mut Cursor::new(exported)).unwrap();
    assert!(status.is_ok(), "{:?}", status.issues);
    assert_eq!(status.applied, 2);

    let app = tree.node("/instance/app").unwrap();
    assert_eq!(app.get("color").unwrap().as_deref(), Some("blue"));
    assert_eq!(app.node("editor").unwrap().get("a/b").unwrap().as_deref(), Some("x"));

    tree.root().flush().unwrap();
    let saved = storage.contents("/mem/instance/.settings/app.prefs").unwrap();
    assert!(saved.contains("color=blue"), "{saved}");
}

#[test]
fn import_clears_export_root_first() {
    let (tree, _storage) = memory_tree();
    let service = PreferencesService::new(tree.clone());
    let app = tree.node("/instance/app").unwrap();
    app.put("color", "blue").unwrap();

    let mut exported = Vec::new();
    service.export_preferences(&app, &mut exported, &[]).unwrap();

    app.put("stale", "1").unwrap();
    app.node("cache").unwrap().put("k", "v").unwrap();
    service.import_preferences(&mut Cursor::new(exported)).unwrap();

    assert_eq!(app.keys().unwrap(), vec!["color"]);
    assert!(!app.node_exists("cache").unwrap());
}

#[test]
fn malformed_lines_are_reported_and_skipped() {
    let (tree, _storage) = memory_tree();
    let service = PreferencesService::new(tree.clone());
    let input = "file_export_version=3.0\n/instance/app/k=v\nbad=\\uZZZZ\n";

    let status = service.import_preferences(&mut Cursor::new(input)).unwrap();
    assert_eq!(status.applied, 1);
    assert_eq!(status.skipped, 1);
    assert_eq!(status.issues[0].line, Some(3));
    assert_eq!(tree.node("/instance/app").unwrap().get("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn legacy_document_is_imported_under_instance() {
    let (tree, _storage) = memory_tree();
    let service = PreferencesService::new(tree.clone());
    let input = "app/color=red\napp/editor/font=mono\nloose=1\n";

    let status = service.import_preferences(&mut Cursor::new(input)).unwrap();
    assert_eq!(status.applied, 2);
    assert_eq!(status.skipped, 1);
    assert_eq!(
        tree.node("/instance/app/editor").unwrap().get("font").unwrap().as_deref(),
        Some("mono")
    );
    assert_eq!(service.get("app", "color", &[]).unwrap().as_deref(), Some("red"));
}

#[test]
fn read_does_not_apply() {
    let (tree, _storage) = memory_tree();
    let service = PreferencesService::new(tree.clone());
    let parsed = service
        .read_preferences(&mut Cursor::new("file_export_version=3.0\n/instance/app/k=v\n"))
        .unwrap();
    assert_eq!(parsed.entries.len(), 2);
    assert_eq!(tree.node("/instance/app").unwrap().get("k").unwrap(), None);
}

#[test]
fn load_level_of_qualifier() {
    let (tree, _storage) = memory_tree();
    let service = PreferencesService::new(tree);
    let level = service.load_level("instance", "app").unwrap().unwrap();
    assert_eq!(level.absolute_path(), "/instance/app");
    assert_eq!(
        service.load_level("default", "app").unwrap().unwrap().absolute_path(),
        "/default/app"
    );
    assert!(service.load_level("scratch", "app").unwrap().is_none());
}

#[test]
fn legacy_view_saves_only_overrides() {
    let (tree, storage) = memory_tree();
    let prefs = LegacyPreferences::new(&tree, "app").unwrap();
    prefs.set_default("color", "black").unwrap();
    prefs.set_value("color", "blue").unwrap();
    prefs.set_value("size", "10").unwrap();
    prefs.set_value("color", "black").unwrap();

    assert!(prefs.needs_saving());
    prefs.save().unwrap();
    assert!(!prefs.needs_saving());

    let saved = storage.contents("/mem/instance/.settings/app.prefs").unwrap();
    assert!(saved.contains("size=10"), "{saved}");
    assert!(!saved.contains("color"), "{saved}");
}

#[test]
fn export_file_moves_settings_between_installations() {
    let dir = tempfile::tempdir().unwrap();
    let source = standard_tree(
        &locations_under(&dir.path().join("a")),
        Arc::new(LocalStorage::new()),
        Arc::new(CustomizerRegistry::new()),
    );
    source.node("/instance/app").unwrap().put("color", "blue").unwrap();
    source.node("/user/app").unwrap().put("font", "mono").unwrap();

    let file = dir.path().join("settings.epf");
    {
        let mut out = std::fs::File::create(&file).unwrap();
        let service = PreferencesService::new(source);
        service
            .export_preferences(&service.root(), &mut out, &["configuration", "default"])
            .unwrap();
    }

    let target = standard_tree(
        &locations_under(&dir.path().join("b")),
        Arc::new(LocalStorage::new()),
        Arc::new(CustomizerRegistry::new()),
    );
    let service = PreferencesService::new(target.clone());
    let status = service
        .import_preferences(&mut std::fs::File::open(&file).unwrap())
        .unwrap();
    assert!(status.is_ok(), "{:?}", status.issues);
    assert_eq!(status.applied, 2);

    target.root().flush().unwrap();
    let saved = std::fs::read_to_string(dir.path().join("b/user/.settings/app.prefs")).unwrap();
    assert!(saved.contains("font=mono"), "{saved}");
}
