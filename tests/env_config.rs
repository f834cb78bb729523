//! Endpoint configuration read from the process environment.
//!
//! Kept in its own test binary: it mutates `VUE_APP_GRAPHQL_PORT`, and
//! every test here runs in one sequential body so nothing else observes it.

use guijs_graphql::client::GraphqlClient;
use guijs_graphql::error::{ClientError, HttpError, LinkError};
use guijs_graphql::network::{EndpointConfig, PORT_ENV_VAR};
use guijs_graphql::operation::Operation;

const PROJECTS: &str = "query Projects { projects { __typename id name } }";

#[tokio::test]
async fn test_endpoints_from_env() {
    std::env::set_var(PORT_ENV_VAR, "4321");
    let client = GraphqlClient::from_env().unwrap();
    assert_eq!(
        client.endpoints().unwrap(),
        &EndpointConfig {
            http_uri: "http://localhost:4321/graphql".into(),
            ws_uri: "ws://localhost:4321/subscriptions".into(),
            reconnect: true,
        }
    );
    assert_eq!(EndpointConfig::default(), EndpointConfig::from_port(Some("4321")));

    std::env::remove_var(PORT_ENV_VAR);
    let client = GraphqlClient::from_env().unwrap();
    let endpoints = client.endpoints().unwrap();
    assert_eq!(endpoints.http_uri, "http://localhost:undefined/graphql");
    assert_eq!(endpoints.ws_uri, "ws://localhost:undefined/subscriptions");

    // The unset port only fails once a request is made.
    let err = client.query(Operation::new(PROJECTS)).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Link(LinkError::Http(HttpError::Request(_)))),
        "got: {err:?}"
    );
}
