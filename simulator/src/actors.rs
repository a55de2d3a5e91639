//! Named actors for simulations.

use wtt_common::{Address, Result};

/// A simulated account holder.
#[derive(Debug, Clone)]
pub struct Actor {
    /// Human name used in scenarios.
    pub name: String,
    /// Derived address.
    pub address: Address,
}

impl Actor {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let address = Address::from_label(&name);
        Self { name, address }
    }
}

/// Lookup from scenario names to actors.
#[derive(Debug, Clone)]
pub struct ActorDirectory {
    actors: Vec<Actor>,
}

impl ActorDirectory {
    /// Create `count` actors, named after the usual cast first.
    pub fn create(count: usize) -> Self {
        let names = ["deployer", "abby", "bena", "chris", "dora", "evie"];

        let actors = (0..count)
            .map(|i| match names.get(i) {
                Some(name) => Actor::new(*name),
                None => Actor::new(format!("actor-{}", i + 1)),
            })
            .collect();

        Self { actors }
    }

    /// Resolve a name to an address. Unknown names are parsed as hex addresses.
    pub fn resolve(&self, name: &str) -> Result<Address> {
        match self.actors.iter().find(|actor| actor.name == name) {
            Some(actor) => Ok(actor.address),
            None => Address::parse(name),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Actor at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Actor> {
        self.actors.get(index)
    }
}
