pub mod health;
pub mod identities;
pub mod internal;
pub mod swipes;

#[cfg(test)]
pub(crate) mod testing;
