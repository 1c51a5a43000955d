use crate::error::ConfigError;
use crate::options::{ClientOptions, DEFAULT_HOST, DEFAULT_NAME};
use crate::tests::mock_socket::MockSocketFactory;

use protocol::DEFAULT_PORT;

/// **VALUE**: Verifies the option defaults a host adapter relies on.
#[test]
fn given_default_options_when_inspected_then_match_inspector_defaults() {
    let options = ClientOptions::default();

    assert_eq!(options.host.as_deref(), Some(DEFAULT_HOST));
    assert_eq!(options.port, DEFAULT_PORT);
    assert!(!options.secure);
    assert_eq!(options.name, DEFAULT_NAME);
    assert_eq!(options.plugins.len(), 7, "All core plugins are installed by default");
    assert!(options.socket_factory.is_none());
}

/// **VALUE**: Verifies each validation failure.
///
/// **WHY THIS MATTERS**: Configuration errors must surface at `configure()`, not later as a socket
/// that silently never opens.
///
/// **BUG THIS CATCHES**: Would catch a missing factory or port 0 being accepted.
#[test]
fn given_invalid_options_when_validated_then_return_config_errors() {
    // GIVEN: Options without a factory
    let missing_factory = ClientOptions::default();
    assert!(matches!(
        missing_factory.validate(),
        Err(ConfigError::InvalidSocketFactory { .. })
    ));

    let factory = MockSocketFactory::default();

    // GIVEN: An empty host
    let mut empty_host = factory.options();
    empty_host.host = Some("  ".to_string());
    assert!(matches!(
        empty_host.validate(),
        Err(ConfigError::InvalidHost { .. })
    ));

    // GIVEN: Port 0
    let mut zero_port = factory.options();
    zero_port.port = 0;
    assert!(matches!(
        zero_port.validate(),
        Err(ConfigError::InvalidPort { .. })
    ));

    // GIVEN: A host that cannot form a URL
    let mut bad_host = factory.options();
    bad_host.host = Some("bad host".to_string());
    assert!(matches!(
        bad_host.validate(),
        Err(ConfigError::InvalidHost { .. })
    ));
}

/// **VALUE**: Verifies that a missing host is valid configuration and that `secure` picks `wss`.
#[test]
fn given_host_and_secure_flag_when_building_url_then_scheme_and_host_follow() {
    let factory = MockSocketFactory::default();

    let mut no_host = factory.options();
    no_host.host = None;
    no_host.validate().expect("missing host is allowed");
    assert!(no_host.url().expect("url builds").is_none());

    let mut secure = factory.options();
    secure.secure = true;
    secure.host = Some("10.0.2.2".to_string());
    secure.port = 9090;
    let url = secure.url().expect("url builds").expect("host set");
    assert_eq!(url.as_str(), "wss://10.0.2.2:9090/");
}
