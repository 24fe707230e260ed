#![allow(dead_code)]

pub mod artifact_server;
pub mod scripts;
