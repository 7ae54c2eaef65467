mod character;
mod character_file;
mod character_mem;

pub use character::CharacterRepo;
pub use character_file::FileCharacterRepo;
pub use character_mem::MemoryCharacterRepo;
