//! Registry registration rules

use packvault::backends::database;
use packvault::registry::{Registry, RegistryError};
use test_utils::{MockBackends, Registries};

#[test]
fn test_duplicate_type_rejected() {
    let mut registry: Registry<u8> = Registry::new("database");
    registry.register("postgresql", 1).unwrap();

    let err = registry.register("postgresql", 2).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Duplicate {
            domain: "database",
            name: "postgresql".to_string()
        }
    );

    // First registration is kept
    assert_eq!(registry.get("postgresql"), Some(&1));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_empty_type_rejected() {
    let mut registry: Registry<u8> = Registry::new("storage");
    assert_eq!(
        registry.register("  ", 1),
        Err(RegistryError::EmptyName { domain: "storage" })
    );
    assert!(registry.is_empty());
}

#[test]
fn test_lookup_of_unknown_type_is_none() {
    let registries = Registries::builtin().unwrap();
    assert!(registries.databases.get("oracle").is_none());
    assert!(!registries.storages.contains("ftp"));
}

#[test]
fn test_list_types_is_sorted() {
    let registries = Registries::builtin().unwrap();
    assert_eq!(
        registries.notifiers.list_types(),
        vec!["discord", "slack", "webhook"]
    );
}

#[test]
fn test_second_builtin_registration_fails() {
    let mut registries = Registries::builtin().unwrap();
    let result = database::register_all(&mut registries.databases);
    assert!(matches!(result, Err(RegistryError::Duplicate { .. })));
}

#[test]
fn test_mock_backends_register_once() {
    let backends = MockBackends::new();
    let mut registries = Registries::builtin().unwrap();
    backends.register(&mut registries).unwrap();
    assert!(registries.storages.contains("mock"));

    let err = backends.register(&mut registries).unwrap_err();
    assert_eq!(
        err,
        RegistryError::Duplicate {
            domain: "database",
            name: "mock".to_string()
        }
    );
}
