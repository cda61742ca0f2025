// SPDX-License-Identifier: AGPL-3.0

//! The branch sink: where concolic branch decisions are delivered.
//!
//! The symbolic runtime never knows who is listening. During one execution
//! the engine installs its path recorder as the current sink; instrumented
//! operator sites report through [`report`] and the sink grows the
//! constraint tree. Outside an execution, branching is a plain boolean read.

use crate::expr::SymNode;
use std::cell::RefCell;
use std::panic::Location;
use std::rc::Rc;

/// Receiver of branch decisions observed while a program runs.
pub trait BranchSink {
    /// Called at every symbolic branch with the direction actually taken,
    /// the boolean expression branched on, and the user-source call site.
    fn which_branch(&mut self, taken: bool, expr: &SymNode, site: &'static Location<'static>);
}

thread_local! {
    static SINK: RefCell<Option<Rc<RefCell<dyn BranchSink>>>> = RefCell::new(None);
}

/// Run `f` with `sink` installed as the current branch sink. The previous
/// sink (normally none) is restored on exit, including on unwind.
pub fn with_sink<R>(sink: Rc<RefCell<dyn BranchSink>>, f: impl FnOnce() -> R) -> R {
    struct Guard(Option<Rc<RefCell<dyn BranchSink>>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let previous = self.0.take();
            SINK.with(|s| *s.borrow_mut() = previous);
        }
    }

    let previous = SINK.with(|s| s.borrow_mut().replace(sink));
    let _guard = Guard(previous);
    f()
}

pub(crate) fn report(taken: bool, expr: &SymNode, site: &'static Location<'static>) {
    let sink = SINK.with(|s| s.borrow().clone());
    if let Some(sink) = sink {
        sink.borrow_mut().which_branch(taken, expr, site);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concolic::SymInt;

    #[derive(Default)]
    struct RecordingSink {
        seen: Vec<(bool, String, u32)>,
    }

    impl BranchSink for RecordingSink {
        fn which_branch(&mut self, taken: bool, expr: &SymNode, site: &'static Location<'static>) {
            self.seen.push((taken, expr.to_string(), site.line()));
        }
    }

    #[test]
    fn test_branches_are_reported_while_installed() {
        let sink = Rc::new(RefCell::new(RecordingSink::default()));
        let dynamic: Rc<RefCell<dyn BranchSink>> = sink.clone();

        let x = SymInt::variable("x", 3);
        let taken = with_sink(dynamic, || x.lt(&SymInt::lit(5)).branch());

        assert!(taken);
        let seen = &sink.borrow().seen;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, true);
        assert_eq!(seen[0].1, "(< x 5)");
    }

    #[test]
    fn test_no_sink_is_a_plain_read() {
        let x = SymInt::variable("x", 3);
        assert!(!x.gt(&SymInt::lit(5)).branch());
    }

    #[test]
    fn test_sink_cleared_after_scope() {
        let sink = Rc::new(RefCell::new(RecordingSink::default()));
        let dynamic: Rc<RefCell<dyn BranchSink>> = sink.clone();

        let x = SymInt::variable("x", 1);
        with_sink(dynamic, || x.eq(&SymInt::lit(1)).branch());
        x.eq(&SymInt::lit(2)).branch();

        assert_eq!(sink.borrow().seen.len(), 1);
    }
}
