pub mod crm;
pub mod interpretation;
pub mod token;
