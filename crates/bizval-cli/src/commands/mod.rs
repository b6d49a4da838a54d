pub mod forecast;
pub mod sensitivity;
pub mod valuation;
