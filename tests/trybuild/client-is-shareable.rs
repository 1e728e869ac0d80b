use user_restapi::{ClientConfig, MockRestAdapter, ResourceClient};

fn assert_shareable<T: Clone + Send + Sync + 'static>() {}

fn main() {
    assert_shareable::<ResourceClient>();
    assert_shareable::<ClientConfig>();
    assert_shareable::<MockRestAdapter>();

    let client = ResourceClient::with_transport(ClientConfig::default(), MockRestAdapter::new());
    let clone = client.clone();
    assert_eq!(clone.config().base_url(), client.config().base_url());
}
