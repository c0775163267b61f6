#![allow(dead_code)]

pub mod catalog_server;
pub mod http_server;
pub mod media_server;
pub mod webdriver_server;
