//! Data models for the todo service.

pub mod todo;

pub use todo::{MAX_TITLE_LEN, NewTodo, Todo, TodoPatch};
