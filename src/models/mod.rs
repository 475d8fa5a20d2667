pub mod ball;
pub mod contact;
pub mod multibody;
