//! Per-task transient memory.
//!
//! Rendering one class allocates many short-lived intermediate strings.
//! Instead of freeing them individually, each task gets a fresh bump arena
//! that is released in bulk when the task finishes, on every exit path
//! including failure, because release is the arena's `Drop`. An arena is
//! created by the worker executing the task and never leaves that thread,
//! so arenas on different workers cannot observe each other's allocations.

use bumpalo::Bump;

pub struct TaskArena {
    bump: Bump,
}

impl TaskArena {
    pub fn new() -> Self {
        Self { bump: Bump::new() }
    }

    /// The underlying allocator, for `bumpalo::format!` and friends.
    pub fn bump(&self) -> &Bump {
        &self.bump
    }

    pub fn alloc_str<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for TaskArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_live_until_the_arena_drops() {
        let arena = TaskArena::new();
        let a = arena.alloc_str("com.example.Main");
        let b = arena.alloc_str("com.example.Other");
        assert_eq!(a, "com.example.Main");
        assert_eq!(b, "com.example.Other");
        assert!(arena.allocated_bytes() >= a.len() + b.len());
    }

    #[test]
    fn fresh_arena_per_task_starts_empty() {
        {
            let arena = TaskArena::new();
            arena.alloc_str("x".repeat(4096).as_str());
        } // bulk-freed here
        let next = TaskArena::new();
        assert_eq!(next.allocated_bytes(), 0);
    }

    #[test]
    fn concurrent_arenas_do_not_interfere() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                std::thread::spawn(move || {
                    let arena = TaskArena::new();
                    let mine = arena.alloc_str(&format!("thread-{i}"));
                    for _ in 0..1000 {
                        arena.alloc_str("filler");
                    }
                    assert_eq!(mine, format!("thread-{i}"));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
