pub mod magic_link_token;
pub mod user;
