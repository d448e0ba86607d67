// @generated by pkgen. DO NOT EDIT.
//! Generated prompt modules

pub mod prompt_a;
