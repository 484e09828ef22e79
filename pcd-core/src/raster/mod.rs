pub mod dimension;
pub mod manifest;
pub mod quality;
pub mod request;
pub mod view;
