pub mod auth;
pub mod dashboard;
pub mod documents;
pub mod franchises;
pub mod leads;
pub mod notes;
pub mod notifications;
pub mod products;
pub mod reviews;
pub mod revenues;
pub mod royalties;
pub mod scope;
pub mod support;
pub mod tasks;
pub mod transactions;
pub mod units;
pub mod users;
