//! The `users` resource.
//!
//! | operation     | request                     | success     |
//! |---------------|-----------------------------|-------------|
//! | `list_users`  | `GET {base}/users`          | 200 + array |
//! | `create_user` | `POST {base}/users`         | 201 or 200  |
//! | `get_user`    | `GET {base}/users/{id}`     | 200         |
//! | `delete_user` | `DELETE {base}/users/{id}`  | 204         |

use serde::{Deserialize, Serialize};

use crate::client::ResourceClient;
use crate::error::ClientResult;

pub const USERS_PATH: &str = "/users";

pub type UserId = u64;

/// A user as the backend returns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Creation payload. Field rules (uniqueness, email format) are enforced by
/// the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

fn user_path(id: UserId) -> String {
    format!("{USERS_PATH}/{id}")
}

impl ResourceClient {
    /// All users, in the order the server returned them.
    pub async fn list_users(&self) -> ClientResult<Vec<User>> {
        Ok(self.get_json(USERS_PATH).await?.into_body())
    }

    pub async fn create_user(&self, user: &NewUser) -> ClientResult<User> {
        Ok(self.post_json(USERS_PATH, user).await?.into_body())
    }

    pub async fn get_user(&self, id: UserId) -> ClientResult<User> {
        Ok(self.get_json(&user_path(id)).await?.into_body())
    }

    pub async fn delete_user(&self, id: UserId) -> ClientResult<()> {
        self.delete(&user_path(id)).await?;
        Ok(())
    }
}
