/*
 * Copyright 2022, Isaac Woods
 * SPDX-License-Identifier: MPL-2.0
 */

//! The scheduler is driven entirely by the PIT. The first three ticks start each terminal's root shell in turn,
//! the fourth hands the CPU back to terminal 1, and after two more ticks to let the shells settle, every tick
//! rotates to the next terminal. Each terminal runs whichever process is deepest in its tree; a process that
//! has called `execute` is waiting for its child and is never scheduled itself.

use crate::{
    process::{ProcessSlot, SavedContext},
    terminal::{TerminalId, NUM_TERMINALS},
    KernelState,
    Platform,
};
use tracing::trace;

/// 20 Hz, so each terminal gets a 50 ms slice.
pub const PIT_FREQUENCY: u32 = 20;
const WARMUP_TICKS: u8 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Boot(TerminalId),
    Handback,
    Warmup(u8),
    RoundRobin,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Decision {
    LaunchRootShell(TerminalId),
    Select(TerminalId),
    Stay,
}

pub struct Scheduler {
    ticks: u64,
    phase: Phase,
    running: Option<TerminalId>,
}

impl Scheduler {
    pub const fn new() -> Scheduler {
        Scheduler { ticks: 0, phase: Phase::Boot(TerminalId::FIRST), running: None }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn running(&self) -> Option<TerminalId> {
        self.running
    }

    /// Advance by one tick and decide what should run next.
    pub fn next_decision(&mut self) -> Decision {
        let tick = self.ticks;
        self.ticks += 1;

        match self.phase {
            Phase::Boot(terminal) => {
                self.phase = match TerminalId::new(terminal.number() + 1) {
                    Some(next) => Phase::Boot(next),
                    None => Phase::Handback,
                };
                Decision::LaunchRootShell(terminal)
            }
            Phase::Handback => {
                self.phase = Phase::Warmup(WARMUP_TICKS);
                Decision::Select(TerminalId::FIRST)
            }
            Phase::Warmup(remaining) => {
                self.phase = if remaining > 1 { Phase::Warmup(remaining - 1) } else { Phase::RoundRobin };
                Decision::Stay
            }
            Phase::RoundRobin => {
                let number = (tick % NUM_TERMINALS as u64) as usize + 1;
                match TerminalId::new(number) {
                    Some(terminal) => Decision::Select(terminal),
                    None => Decision::Stay,
                }
            }
        }
    }
}

/// What the platform should do on the way out of the timer interrupt. The pointers refer to contexts inside
/// PCBs, which stay put for as long as the `KernelState` does.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TickAction {
    /// Carry on running whatever was interrupted.
    Continue,
    /// Save the interrupted context (if anything was running) and jump into `terminal`'s root-shell launcher.
    LaunchRootShell { terminal: TerminalId, save: Option<*mut SavedContext> },
    /// Save the interrupted context into `save` and resume from `restore`.
    Switch { save: *mut SavedContext, restore: *const SavedContext },
}

impl<P> KernelState<P>
where
    P: Platform,
{
    pub fn timer_tick(&mut self) -> TickAction {
        match self.scheduler.next_decision() {
            Decision::Stay => TickAction::Continue,
            Decision::LaunchRootShell(terminal) => {
                trace!("Boot tick: starting root shell of terminal {}", terminal.number());
                let save = self.current_pcb_mut().map(|pcb| &mut pcb.scheduler_context as *mut SavedContext);
                self.scheduler.running = Some(terminal);
                self.sync_video_mappings();
                TickAction::LaunchRootShell { terminal, save }
            }
            Decision::Select(terminal) => self.switch_to_terminal(terminal),
        }
    }

    fn switch_to_terminal(&mut self, entering: TerminalId) -> TickAction {
        let leaving = match self.current_slot() {
            Some(slot) => slot,
            None => return TickAction::Continue,
        };
        let entering_slot: ProcessSlot = match self.terminals.get(entering).active {
            Some(slot) if slot != leaving => slot,
            _ => return TickAction::Continue,
        };

        trace!(
            "Switching from slot {} (terminal {:?}) to slot {} (terminal {})",
            leaving.index(),
            self.running_terminal().map(TerminalId::number),
            entering_slot.index(),
            entering.number()
        );

        let save = match self.processes.get_mut(leaving) {
            Some(pcb) => &mut pcb.scheduler_context as *mut SavedContext,
            None => return TickAction::Continue,
        };
        let restore = match self.processes.get(entering_slot) {
            Some(pcb) => &pcb.scheduler_context as *const SavedContext,
            None => return TickAction::Continue,
        };

        self.scheduler.running = Some(entering);
        self.install_process(entering_slot);
        TickAction::Switch { save, restore }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::layout,
        mock::{boot_to_round_robin, booted_kernel, launch_root_shell},
    };

    fn terminal(number: usize) -> TerminalId {
        TerminalId::new(number).unwrap()
    }

    fn slot(index: usize) -> ProcessSlot {
        ProcessSlot::new(index).unwrap()
    }

    #[test]
    fn phases() {
        let mut scheduler = Scheduler::new();
        let decisions: Vec<Decision> = (0..9).map(|_| scheduler.next_decision()).collect();
        assert_eq!(
            decisions,
            vec![
                Decision::LaunchRootShell(terminal(1)),
                Decision::LaunchRootShell(terminal(2)),
                Decision::LaunchRootShell(terminal(3)),
                Decision::Select(terminal(1)),
                Decision::Stay,
                Decision::Stay,
                Decision::Select(terminal(1)),
                Decision::Select(terminal(2)),
                Decision::Select(terminal(3)),
            ]
        );
        assert_eq!(scheduler.phase(), Phase::RoundRobin);
    }

    #[test]
    fn round_robin_is_fair() {
        let mut scheduler = Scheduler::new();
        while scheduler.phase() != Phase::RoundRobin {
            scheduler.next_decision();
        }

        // Start the window at an arbitrary point
        for _ in 0..7 {
            scheduler.next_decision();
        }

        let k = 100;
        let mut counts = [0; NUM_TERMINALS];
        for _ in 0..(3 * k) {
            match scheduler.next_decision() {
                Decision::Select(terminal) => counts[terminal.index()] += 1,
                other => panic!("Unexpected decision in round robin: {:?}", other),
            }
        }
        assert_eq!(counts, [k; NUM_TERMINALS]);
    }

    #[test]
    fn boot_ticks_start_root_shells() {
        let mut kernel = booted_kernel();

        assert_eq!(kernel.timer_tick(), TickAction::LaunchRootShell { terminal: terminal(1), save: None });
        launch_root_shell(&mut kernel, terminal(1));
        assert_eq!(kernel.current_slot(), Some(slot(0)));

        for number in 2..=3 {
            let expected_save = &mut kernel.current_pcb_mut().unwrap().scheduler_context as *mut SavedContext;
            assert_eq!(
                kernel.timer_tick(),
                TickAction::LaunchRootShell { terminal: terminal(number), save: Some(expected_save) }
            );
            launch_root_shell(&mut kernel, terminal(number));
        }

        // After three ticks, every terminal has a root shell and terminal 1 is still the one on screen
        assert_eq!(kernel.processes.live_count(), 3);
        for id in TerminalId::all() {
            let pcb = kernel.processes.get(kernel.terminals.get(id).active.unwrap()).unwrap();
            assert_eq!(pcb.parent, None);
            assert_eq!(pcb.terminal, id);
        }
        assert_eq!(kernel.terminals.visible(), terminal(1));

        // The fourth tick hands back to terminal 1, whose shell lives in slot 0
        match kernel.timer_tick() {
            TickAction::Switch { save, restore } => {
                assert_eq!(save as *const _, &kernel.processes.get(slot(2)).unwrap().scheduler_context as *const _);
                assert_eq!(restore, &kernel.processes.get(slot(0)).unwrap().scheduler_context as *const _);
            }
            other => panic!("Expected a switch, got {:?}", other),
        }
        assert_eq!(kernel.running_terminal(), Some(terminal(1)));
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
        assert_eq!(kernel.platform.kernel_stack, Some(slot(0).kernel_stack().top));
        assert_eq!(kernel.address_space.video_window_target(), Some(layout::VIDEO_MEMORY));
    }

    #[test]
    fn warmup_does_not_switch() {
        let mut kernel = booted_kernel();
        for number in 1..=3 {
            kernel.timer_tick();
            launch_root_shell(&mut kernel, terminal(number));
        }
        kernel.timer_tick();

        assert_eq!(kernel.timer_tick(), TickAction::Continue);
        assert_eq!(kernel.timer_tick(), TickAction::Continue);
        assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(0)));
    }

    #[test]
    fn round_robin_remaps_for_each_terminal() {
        let mut kernel = boot_to_round_robin();

        // Tick 6 selects terminal 1, which is already running
        assert_eq!(kernel.timer_tick(), TickAction::Continue);

        for (number, slot_index) in [(2, 1), (3, 2), (1, 0), (2, 1)] {
            assert!(matches!(kernel.timer_tick(), TickAction::Switch { .. }));
            assert_eq!(kernel.running_terminal(), Some(terminal(number)));
            assert_eq!(kernel.address_space.mapped_program_slot(), Some(slot(slot_index)));
            assert_eq!(kernel.platform.kernel_stack, Some(slot(slot_index).kernel_stack().top));

            let expected_window =
                if number == 1 { layout::VIDEO_MEMORY } else { layout::background_buffer(terminal(number)) };
            assert_eq!(kernel.address_space.video_window_target(), Some(expected_window));
        }
    }

    #[test]
    fn visible_terminal_survives_rotation() {
        let mut kernel = boot_to_round_robin();
        kernel.switch_visible_terminal(terminal(3));

        for _ in 0..6 {
            kernel.timer_tick();
            assert_eq!(kernel.terminals.visible(), terminal(3));
            let running = kernel.running_terminal().unwrap();
            assert_eq!(kernel.address_space.video_window_target(), Some(kernel.video_target(running)));
        }
    }
}
