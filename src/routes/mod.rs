pub mod oauth;
pub mod web;
