use user_restapi::{ClientConfig, MockRestAdapter, NewUser, ResourceClient};

fn assert_send<T: Send>(_: &T) {}

fn main() {
    let client = ResourceClient::with_transport(ClientConfig::default(), MockRestAdapter::new());
    let payload = NewUser::new("ada", "ada@example.com", "hunter2");

    let list = client.list_users();
    assert_send(&list);
    let create = client.create_user(&payload);
    assert_send(&create);
    let get = client.get_user(1);
    assert_send(&get);
    let delete = client.delete_user(1);
    assert_send(&delete);
}
