//! Core of the trailstory travel journal: journeys made of geotagged
//! checkpoints with attached media, plus user profiles and follows.

pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod ids;
pub mod models;
pub mod repository;
pub mod service;
pub mod storage;
pub mod views;
