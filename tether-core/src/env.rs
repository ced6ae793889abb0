#![forbid(unsafe_code)]

use tether_ir::{RefKind, Span, Ty, Universe};

use crate::config::FreeLeafReads;
use crate::diagnostics::LinearityError;

/// Consumption state of a linear binding.
///
/// ```text
/// let f: File := open("x");   // Unconsumed
/// borrow f as r in R do .. end // Frozen inside the block, Unconsumed after
/// close(f);                   // Consumed
/// close(f);                   // error: already Consumed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindingState {
    Unconsumed,
    Consumed { at: Span },
    /// Borrowed; neither consumable nor re-borrowable until the region closes.
    Frozen { kind: RefKind, at: Span },
}

/// Stable identity of a binding: its frame and its slot in that frame.
///
/// Frames are only ever pushed and popped, so a binding keeps its id in every
/// snapshot taken while it is in scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId {
    pub frame: usize,
    pub slot: usize,
}

#[derive(Clone, Debug)]
pub struct Binding {
    pub name: String,
    pub ty: Ty,
    pub universe: Universe,
    pub defined_at: Span,
    pub state: BindingState,
    /// Number of regions in scope when the binding was defined. A value
    /// stored into the binding may only mention those regions.
    pub region_depth: usize,
}

impl Binding {
    pub fn new(name: String, ty: Ty, universe: Universe, defined_at: Span, region_depth: usize) -> Self {
        Binding {
            name,
            ty,
            universe,
            defined_at,
            state: BindingState::Unconsumed,
            region_depth,
        }
    }

    pub fn is_linear(&self) -> bool {
        self.universe.is_linear()
    }
}

/// Per-function binding environment: a stack of lexical frames.
///
/// Cloning is the snapshot operation used at branch points; the join engine
/// compares snapshots by `BindingId`.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    frames: Vec<Vec<Binding>>,
    /// Frames below this index belong outside the innermost loop.
    loop_barrier: Option<usize>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            frames: vec![Vec::new()],
            loop_barrier: None,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Pop the innermost frame, returning its bindings.
    pub fn pop_frame(&mut self) -> Vec<Binding> {
        self.frames.pop().unwrap_or_default()
    }

    pub fn define(&mut self, binding: Binding) -> BindingId {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        let frame = self.frames.len() - 1;
        let slots = &mut self.frames[frame];
        slots.push(binding);
        BindingId {
            frame,
            slot: slots.len() - 1,
        }
    }

    /// Innermost binding with this name.
    pub fn lookup(&self, name: &str) -> Option<(BindingId, &Binding)> {
        for (frame, slots) in self.frames.iter().enumerate().rev() {
            if let Some(slot) = slots.iter().rposition(|b| b.name == name) {
                return Some((BindingId { frame, slot }, &slots[slot]));
            }
        }
        None
    }

    pub fn get(&self, id: BindingId) -> Option<&Binding> {
        self.frames.get(id.frame).and_then(|f| f.get(id.slot))
    }

    fn get_mut(&mut self, id: BindingId) -> Option<&mut Binding> {
        self.frames.get_mut(id.frame).and_then(|f| f.get_mut(id.slot))
    }

    /// All linear bindings in scope, outermost first.
    pub fn linear_bindings(&self) -> impl Iterator<Item = (BindingId, &Binding)> {
        self.frames.iter().enumerate().flat_map(|(frame, slots)| {
            slots
                .iter()
                .enumerate()
                .filter(|(_, b)| b.is_linear())
                .map(move |(slot, b)| (BindingId { frame, slot }, b))
        })
    }

    /// Place a loop barrier at the current depth, returning the previous one.
    pub fn enter_loop(&mut self) -> Option<usize> {
        self.loop_barrier.replace(self.frames.len())
    }

    pub fn exit_loop(&mut self, previous: Option<usize>) {
        self.loop_barrier = previous;
    }

    fn outside_loop(&self, id: BindingId) -> bool {
        self.loop_barrier.is_some_and(|barrier| id.frame < barrier)
    }

    /// Linear binding `name`, if it may be touched at `at`.
    fn tracked(&self, name: &str, at: Span) -> Result<Option<BindingId>, LinearityError> {
        let Some((id, binding)) = self.lookup(name) else {
            return Ok(None);
        };
        if !binding.is_linear() {
            return Ok(None);
        }
        if self.outside_loop(id) {
            return Err(LinearityError::LinearInLoopBody {
                name: name.to_string(),
                used_at: at,
                defined_at: binding.defined_at,
            });
        }
        Ok(Some(id))
    }

    /// Move the value out of `name`. Free bindings are not tracked.
    pub fn consume(&mut self, name: &str, at: Span) -> Result<Option<BindingId>, LinearityError> {
        let Some(id) = self.tracked(name, at)? else {
            return Ok(None);
        };
        let Some(binding) = self.get_mut(id) else {
            return Ok(None);
        };
        match binding.state {
            BindingState::Unconsumed => {
                binding.state = BindingState::Consumed { at };
                Ok(Some(id))
            }
            BindingState::Consumed { at: first } | BindingState::Frozen { at: first, .. } => {
                Err(LinearityError::DoubleConsumption {
                    name: name.to_string(),
                    first_use: first,
                    second_use: at,
                })
            }
        }
    }

    /// Non-consuming use of `name`, e.g. the root of a path to a Free leaf.
    pub fn read(
        &self,
        name: &str,
        at: Span,
        policy: FreeLeafReads,
    ) -> Result<Option<BindingId>, LinearityError> {
        let Some(id) = self.tracked(name, at)? else {
            return Ok(None);
        };
        let Some(binding) = self.get(id) else {
            return Ok(None);
        };
        match binding.state {
            BindingState::Unconsumed => Ok(Some(id)),
            BindingState::Frozen {
                kind: RefKind::Read,
                ..
            } if policy == FreeLeafReads::Any => Ok(Some(id)),
            BindingState::Frozen { at: prior, .. } => Err(LinearityError::ConflictingBorrow {
                name: name.to_string(),
                prior_borrow: prior,
                at,
            }),
            BindingState::Consumed { at: consumed_at } => Err(LinearityError::UseAfterConsume {
                name: name.to_string(),
                consumed_at,
                used_at: at,
            }),
        }
    }

    /// Freeze `name` for a borrow of the given kind.
    pub fn freeze(
        &mut self,
        name: &str,
        kind: RefKind,
        at: Span,
    ) -> Result<Option<BindingId>, LinearityError> {
        let Some(id) = self.tracked(name, at)? else {
            return Ok(None);
        };
        let Some(binding) = self.get_mut(id) else {
            return Ok(None);
        };
        match binding.state {
            BindingState::Unconsumed => {
                binding.state = BindingState::Frozen { kind, at };
                Ok(Some(id))
            }
            BindingState::Frozen { at: prior, .. } => Err(LinearityError::ConflictingBorrow {
                name: name.to_string(),
                prior_borrow: prior,
                at,
            }),
            BindingState::Consumed { at: consumed_at } => Err(LinearityError::UseAfterConsume {
                name: name.to_string(),
                consumed_at,
                used_at: at,
            }),
        }
    }

    /// Restore a frozen binding once its region closes.
    pub fn thaw(&mut self, id: BindingId) {
        if let Some(binding) = self.get_mut(id) {
            if matches!(binding.state, BindingState::Frozen { .. }) {
                binding.state = BindingState::Unconsumed;
            }
        }
    }

    /// Store a fresh value into `name`. A linear binding must be Consumed
    /// first, or the old value would be dropped.
    pub fn overwrite(&mut self, name: &str, at: Span) -> Result<Option<BindingId>, LinearityError> {
        let Some(id) = self.tracked(name, at)? else {
            return Ok(None);
        };
        let Some(binding) = self.get_mut(id) else {
            return Ok(None);
        };
        match binding.state {
            BindingState::Consumed { .. } => {
                binding.state = BindingState::Unconsumed;
                Ok(Some(id))
            }
            BindingState::Unconsumed => Err(LinearityError::IllegalDiscard {
                name: Some(name.to_string()),
                ty: binding.ty.display(),
                at,
            }),
            BindingState::Frozen { at: prior, .. } => Err(LinearityError::ConflictingBorrow {
                name: name.to_string(),
                prior_borrow: prior,
                at,
            }),
        }
    }

    /// Mark a binding as holding a value again after a join.
    pub fn restore(&mut self, id: BindingId) {
        if let Some(binding) = self.get_mut(id) {
            binding.state = BindingState::Unconsumed;
        }
    }

    pub fn mark_consumed(&mut self, id: BindingId, at: Span) {
        if let Some(binding) = self.get_mut(id) {
            binding.state = BindingState::Consumed { at };
        }
    }

    /// Linear bindings of every enclosing frame that still hold a value.
    pub fn live_linear(&self) -> Vec<&Binding> {
        self.linear_bindings()
            .map(|(_, b)| b)
            .filter(|b| !matches!(b.state, BindingState::Consumed { .. }))
            .collect()
    }
}

/// Scope exit: every linear binding of the frame must have been consumed.
pub fn check_scope_exit(frame: &[Binding], scope_end: Span) -> Vec<LinearityError> {
    frame
        .iter()
        .filter(|b| b.is_linear() && !matches!(b.state, BindingState::Consumed { .. }))
        .map(|b| unconsumed(b, scope_end))
        .collect()
}

pub fn unconsumed(binding: &Binding, scope_end: Span) -> LinearityError {
    LinearityError::UnconsumedBinding {
        name: binding.name.clone(),
        ty: binding.ty.display(),
        defined_at: binding.defined_at,
        scope_end,
    }
}
