/// Authentication core.
///
/// Token codec, password hashing, session orchestration (login / refresh
/// rotation / logout), and the password-reset OTP flow.
mod claims;
mod jwt;
mod password;
pub mod reset;
pub mod session;

pub use claims::{Claims, TokenKind};
pub use jwt::decode_token;
pub use jwt::generate_access_token;
pub use jwt::generate_refresh_token;
pub use password::hash_password;
pub use password::verify_password;
