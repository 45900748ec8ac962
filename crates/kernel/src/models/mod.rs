//! Database models.

pub mod group;
pub mod happening;
pub mod profile;
pub mod user;

pub use group::{Group, NolleGroup};
pub use happening::{Happening, HappeningInput};
pub use profile::{Program, ProfileInput, UserProfile, UserType};
pub use user::{CreateUser, User, dummy_verify, hash_password};
