mod auth;
mod health_check;

pub use auth::{
    forgot_password, get_current_user, login, logout, refresh, register, reset_password,
    update_profile,
};
pub use health_check::health_check;
