use serde::{Deserialize, Serialize};

/// Raw admin credentials, received from the login form.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub password: String,
}
