//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod refresh_token;

pub use jwt::{Claims, JwtService};
pub use middleware::{bearer_token, jwt_auth_middleware, AuthContext};
pub use password::PasswordHasher;
pub use refresh_token::RefreshTokenGenerator;
