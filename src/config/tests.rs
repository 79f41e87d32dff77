use super::*;

#[test]
fn defaults_resolve() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:8000");
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert_eq!(settings.uploads.directory, PathBuf::from("media"));
    assert!(settings.cache.enable_response_cache);
    assert_eq!(settings.cache.response_ttl, Duration::from_secs(20));
    assert_eq!(settings.auth.session_ttl, Duration::from_secs(14 * 24 * 3600));
    assert!(!settings.auth.cookie_secure);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn uploads_limit_defaults_to_10_mib() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
    assert_eq!(
        settings.uploads.max_request_bytes.get(),
        DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES
    );
}

#[test]
fn cache_can_be_disabled_from_cli() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        cache_enable: Some(false),
        cache_ttl_seconds: Some(5),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enable_response_cache);
    assert_eq!(settings.cache.response_ttl, Duration::from_secs(5));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.response_ttl_seconds = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero ttl rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.response_ttl_seconds",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.database.max_connections = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn invalid_log_level_is_reported() {
    let mut raw = RawSettings::default();
    raw.logging.level = Some("loud".to_string());
    let err = Settings::from_raw(raw).expect_err("invalid level");
    assert!(err.to_string().contains("logging.level"));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["yatube"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "yatube",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-enable",
        "false",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_enable, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_group_create_arguments() {
    let args = CliArgs::parse_from([
        "yatube",
        "groups",
        "create",
        "--database-url",
        "postgres://example",
        "--slug",
        "cats",
        "--description",
        "All about cats",
        "--title",
        "Cats",
    ]);

    let Some(Command::Groups(groups)) = args.command else {
        panic!("wrong command parsed");
    };
    match groups.command {
        GroupsCommand::Create(create) => {
            assert_eq!(create.title, "Cats");
            assert_eq!(create.slug.as_deref(), Some("cats"));
            assert_eq!(create.description, "All about cats");
            assert_eq!(
                create.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn group_command_database_override_applies() {
    let args = CliArgs::parse_from([
        "yatube",
        "groups",
        "delete",
        "--database-url",
        "postgres://groups",
        "cats",
    ]);

    let mut raw = RawSettings::default();
    raw.apply_command_overrides(args.command.as_ref());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.database.url.as_deref(), Some("postgres://groups"));
}

#[test]
fn parse_user_create_arguments() {
    let args = CliArgs::parse_from([
        "yatube",
        "users",
        "create",
        "--password",
        "correct horse",
        "--email",
        "leo@example.com",
        "--username",
        "leo",
    ]);

    let Some(Command::Users(users)) = args.command else {
        panic!("wrong command parsed");
    };
    let UsersCommand::Create(create) = users.command;
    assert_eq!(create.username, "leo");
    assert_eq!(create.password, "correct horse");
    assert_eq!(create.email, "leo@example.com");
}

#[test]
#[serial_test::serial]
fn environment_sits_between_files_and_cli() {
    // SAFETY: serialised with every other test that touches the environment.
    unsafe { std::env::set_var("YATUBE__SERVER__PORT", "9100") };

    let from_env = load(&CliArgs::parse_from(["yatube"]));
    let from_cli = load(&CliArgs::parse_from([
        "yatube",
        "serve",
        "--server-port",
        "9200",
    ]));

    unsafe { std::env::remove_var("YATUBE__SERVER__PORT") };

    assert_eq!(from_env.expect("env settings").server.addr.port(), 9100);
    assert_eq!(from_cli.expect("cli settings").server.addr.port(), 9200);
}
