pub mod tagger;
