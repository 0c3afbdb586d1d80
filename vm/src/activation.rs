use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(0);

/// Names one activation of a method that catches non-local returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActivationToken {
    arena: u32,
    index: u32,
    generation: u32,
}

/// Generation table answering "is this activation still on the stack?".
///
/// Leaving an activation bumps the generation of its index, so every token
/// handed out for it stops matching, and the index is reused by later
/// activations.
#[derive(Debug)]
pub struct ActivationArena {
    id: u32,
    generations: Vec<u32>,
    free: Vec<u32>,
    live: usize,
}

impl Default for ActivationArena {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivationArena {
    pub fn new() -> Self {
        Self {
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            generations: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub fn enter(&mut self) -> ActivationToken {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.generations.push(0);
                (self.generations.len() - 1) as u32
            }
        };
        self.live += 1;
        ActivationToken { arena: self.id, index, generation: self.generations[index as usize] }
    }

    pub fn exit(&mut self, token: ActivationToken) {
        debug_assert!(self.is_on_stack(token), "exiting a dead activation");
        if let Some(generation) = self.generations.get_mut(token.index as usize) {
            *generation = generation.wrapping_add(1);
            self.free.push(token.index);
            self.live -= 1;
        }
    }

    pub fn is_on_stack(&self, token: ActivationToken) -> bool {
        token.arena == self.id
            && self.generations.get(token.index as usize) == Some(&token.generation)
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_die_on_exit() {
        let mut arena = ActivationArena::new();
        let a = arena.enter();
        let b = arena.enter();
        assert!(arena.is_on_stack(a));
        assert!(arena.is_on_stack(b));
        arena.exit(b);
        assert!(!arena.is_on_stack(b));

        // The freed index is reused under a new generation.
        let c = arena.enter();
        assert!(arena.is_on_stack(c));
        assert!(!arena.is_on_stack(b));
        assert_eq!(arena.live(), 2);
    }

    #[test]
    fn tokens_do_not_cross_arenas() {
        let mut first = ActivationArena::new();
        let second = ActivationArena::new();
        let token = first.enter();
        assert!(!second.is_on_stack(token));
    }
}
