use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request,
};

use crate::config::Config;

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
pub const ADMIN_PASSWORD_HEADER: &str = "X-Admin-Password";

/// Who is voting: the first address in `X-Forwarded-For` if a proxy set one,
/// otherwise the address of the connecting client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterIdentity(pub String);

#[derive(Debug)]
pub struct MissingIdentity;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterIdentity {
    type Error = MissingIdentity;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let forwarded = req
            .headers()
            .get_one(FORWARDED_FOR_HEADER)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|first| !first.is_empty());

        if let Some(first) = forwarded {
            return Outcome::Success(VoterIdentity(first.to_string()));
        }
        match req.client_ip() {
            Some(ip) => Outcome::Success(VoterIdentity(ip.to_string())),
            None => Outcome::Failure((Status::BadRequest, MissingIdentity)),
        }
    }
}

/// Whether the request carries the admin password. Never fails; routes turn
/// a `false` into an error through [`Admin::authorize`](crate::engine::Admin::authorize).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminFlag(pub bool);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminFlag {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let authorized = match (
            req.rocket().state::<Config>(),
            req.headers().get_one(ADMIN_PASSWORD_HEADER),
        ) {
            (Some(config), Some(password)) => config.is_admin_password(password),
            _ => false,
        };
        Outcome::Success(AdminFlag(authorized))
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{Header, Status},
        local::asynchronous::Client,
    };

    use super::*;

    #[get("/whoami")]
    fn whoami(identity: VoterIdentity) -> String {
        identity.0
    }

    #[get("/am-i-admin")]
    fn am_i_admin(flag: AdminFlag) -> String {
        flag.0.to_string()
    }

    async fn client() -> Client {
        let rocket = rocket::custom(crate::test_figment())
            .attach(crate::config::ConfigFairing)
            .mount("/", routes![whoami, am_i_admin]);
        Client::tracked(rocket).await.unwrap()
    }

    #[rocket::async_test]
    async fn identity_is_first_forwarded_address() {
        let client = client().await;
        let response = client
            .get("/whoami")
            .header(Header::new(FORWARDED_FOR_HEADER, " 10.0.0.7 , 172.16.0.1"))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "10.0.0.7");
    }

    #[rocket::async_test]
    async fn identity_falls_back_to_client_address() {
        let client = client().await;
        let response = client
            .get("/whoami")
            .remote("192.168.1.20:5000".parse().unwrap())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "192.168.1.20");
    }

    #[rocket::async_test]
    async fn admin_flag_checks_password() {
        let client = client().await;

        let response = client.get("/am-i-admin").dispatch().await;
        assert_eq!(response.into_string().await.unwrap(), "false");

        let response = client
            .get("/am-i-admin")
            .header(Header::new(ADMIN_PASSWORD_HEADER, "letmein"))
            .dispatch()
            .await;
        assert_eq!(response.into_string().await.unwrap(), "false");

        let response = client
            .get("/am-i-admin")
            .header(Header::new(
                ADMIN_PASSWORD_HEADER,
                crate::TEST_ADMIN_PASSWORD,
            ))
            .dispatch()
            .await;
        assert_eq!(response.into_string().await.unwrap(), "true");
    }
}
