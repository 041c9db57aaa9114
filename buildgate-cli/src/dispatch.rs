use buildgate_core::{Dispatcher, Instruction};
use std::cell::RefCell;
use std::io::Write;

/// Prints each instruction for whoever picks up the next step.
pub struct ConsoleDispatcher<W: Write> {
    out: RefCell<W>,
}

impl<W: Write> ConsoleDispatcher<W> {
    pub const fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write> Dispatcher for ConsoleDispatcher<W> {
    type Error = std::io::Error;

    fn dispatch(&self, instruction: &Instruction) -> Result<(), Self::Error> {
        let mut out = self.out.borrow_mut();
        writeln!(out, "[TO={}] {}", instruction.target, instruction.directive)?;
        if let Some(build) = instruction.build_number {
            writeln!(out, "  build: {build}")?;
        }
        if let Some(tuning) = &instruction.tuning {
            let actions: Vec<&str> = tuning.actions().map(|a| a.as_str()).collect();
            writeln!(out, "  tuning: {}", actions.join(", "))?;
        }
        out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildgate_core::{Collaborator, TuningParameters};

    #[test]
    fn prints_target_and_payload() {
        let dispatcher = ConsoleDispatcher::new(Vec::new());
        dispatcher
            .dispatch(&Instruction {
                target: Collaborator::GameDirector,
                directive: "Revise game design".into(),
                tuning: Some(TuningParameters::for_scores(0.9, 0.9)),
                build_number: None,
            })
            .unwrap();
        let text = String::from_utf8(dispatcher.into_inner()).unwrap();
        assert!(text.starts_with("[TO=GameDirector] Revise game design"));
        assert!(text.contains("tuning: optimize_particle_systems, reduce_draw_calls"));
        assert!(!text.contains("build:"));
    }
}
