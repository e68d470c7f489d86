pub mod mural;
