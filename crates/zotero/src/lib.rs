pub mod client;

pub use client::{Collection, FetchedFile, Library, ListFilter, ZoteroClient};
