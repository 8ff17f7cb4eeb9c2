//! Models shared by the database layer, the services and the routes.

pub mod user;

pub use user::{
    NewUser, Profile, RegisteredUser, User, UserCredentials, UserUpdate, non_blank,
};
