use shapeshifter_ipc::{
    env::{CLIENT_TRANSPORTS, ORPORT, SERVER_BINDADDR, SERVER_TRANSPORTS},
    ClientConfig,
    ClientSettings,
    Error,
    MapEnvironment,
    Messenger,
    Role,
    ServerConfig,
    ServerSettings,
};

#[test]
fn server_filters_disabled_transports() {
    let _ = env_logger::try_init();

    let settings = ServerSettings {
        bindaddr: Some("obfs4-127.0.0.1:1234,meek-127.0.0.1:5678".to_owned()),
        transports: Some("obfs4".to_owned()),
        orport: Some("127.0.0.1:9001".to_owned()),
        ..Default::default()
    };

    let config = ServerConfig::resolve(&settings, &MapEnvironment::new()).unwrap();
    assert_eq!(config.bindaddrs.len(), 1);
    assert_eq!(config.bindaddrs[0].method_name, "obfs4");
    assert_eq!(config.bindaddrs[0].addr, "127.0.0.1:1234".parse().unwrap());
}

#[test]
fn server_rejects_malformed_options() {
    let _ = env_logger::try_init();

    let settings = ServerSettings {
        options: Some("obfs4:key".to_owned()),
        ..Default::default()
    };
    let env = MapEnvironment::new()
        .with(SERVER_BINDADDR, "obfs4-127.0.0.1:1234")
        .with(SERVER_TRANSPORTS, "obfs4")
        .with(ORPORT, "127.0.0.1:9001");

    match ServerConfig::resolve(&settings, &env) {
        Err(Error::OptionParse { entry, .. }) => assert_eq!(entry, "obfs4:key"),
        r => panic!("unexpected result {:?}", r),
    }
}

#[test]
fn client_wildcard_is_registry() {
    let _ = env_logger::try_init();

    let registry = ["identity", "obfs2", "obfs4"];
    let settings = ClientSettings {
        ptversion: Some("2".to_owned()),
        transports: Some("*".to_owned()),
        proxy: None,
    };

    let mut messenger = Messenger::new(Vec::new());
    let config = ClientConfig::resolve(&settings, &MapEnvironment::new(), &registry, &mut messenger).unwrap();
    assert_eq!(config.method_names, registry);
}

#[test]
fn role_is_decided_before_anything_else() {
    let _ = env_logger::try_init();

    // Only the transport variables matter to the role, not the rest of the server setup
    let env = MapEnvironment::new().with(SERVER_BINDADDR, "obfs4-127.0.0.1:1234");
    assert!(matches!(Role::decide(false, false, &env), Err(Error::AmbiguousRole(..))));

    let env = env.with(CLIENT_TRANSPORTS, "obfs4");
    assert_eq!(Role::decide(false, false, &env), Ok(Role::Client));
}
