//! The bridge worker: the only code that calls the input driver.
//!
//! The worker pops one message at a time.  A relative move absorbs every
//! relative move queued right behind it, so a burst of camera samples
//! becomes one driver call; the first non-move message stops the merge and
//! is processed next, which keeps moves from being reordered past keys or
//! buttons.
//!
//! The worker also remembers which keys and buttons are down.  A release
//! for something that is not held is skipped, as is a second press of
//! something already held, so releasing everything on shutdown is exact.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, warn};

use touchmap_core::{ButtonFlag, InjectCommand, KeyDirection, MouseButton};

use crate::infrastructure::input_driver::{DriverError, InputDriver};

pub(crate) enum BridgeMsg {
    Inject(InjectCommand),
    /// Release everything held, then acknowledge.
    ReleaseAll(Sender<()>),
    /// Release everything held, then exit.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Continue,
    Exit,
}

pub(crate) struct Worker<D> {
    driver: D,
    rx: Receiver<BridgeMsg>,
    pending: Option<BridgeMsg>,
    held_keys: BTreeSet<u16>,
    held_buttons: BTreeSet<MouseButton>,
    pace: Duration,
}

impl<D: InputDriver> Worker<D> {
    pub(crate) fn new(driver: D, rx: Receiver<BridgeMsg>, pace: Duration) -> Self {
        Self {
            driver,
            rx,
            pending: None,
            held_keys: BTreeSet::new(),
            held_buttons: BTreeSet::new(),
            pace,
        }
    }

    pub(crate) fn run(mut self) {
        while self.step() == Step::Continue {}
        debug!("input bridge worker exiting");
    }

    /// Processes one message, blocking until one is available.  A closed
    /// queue is treated like `Stop`.
    pub(crate) fn step(&mut self) -> Step {
        let msg = match self.pending.take() {
            Some(msg) => msg,
            None => match self.rx.recv() {
                Ok(msg) => msg,
                Err(_) => {
                    self.release_all();
                    return Step::Exit;
                }
            },
        };

        match msg {
            BridgeMsg::Inject(InjectCommand::MoveRel { dx, dy }) => {
                let (dx, dy) = self.coalesce(dx, dy);
                if (dx, dy) != (0, 0) {
                    let result = self.driver.emit_move_relative(dx, dy);
                    self.after_call("relative move", result);
                }
            }
            BridgeMsg::Inject(command) => self.execute(command),
            BridgeMsg::ReleaseAll(ack) => {
                self.release_all();
                let _ = ack.send(());
            }
            BridgeMsg::Stop => {
                self.release_all();
                return Step::Exit;
            }
        }
        Step::Continue
    }

    fn coalesce(&mut self, mut dx: i32, mut dy: i32) -> (i32, i32) {
        loop {
            match self.rx.try_recv() {
                Ok(BridgeMsg::Inject(InjectCommand::MoveRel { dx: ndx, dy: ndy })) => {
                    dx = dx.saturating_add(ndx);
                    dy = dy.saturating_add(ndy);
                }
                Ok(other) => {
                    self.pending = Some(other);
                    break;
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        (dx, dy)
    }

    fn execute(&mut self, command: InjectCommand) {
        match command {
            InjectCommand::Key { scancode, direction } => {
                let changed = match direction {
                    KeyDirection::Down => self.held_keys.insert(scancode),
                    KeyDirection::Up => self.held_keys.remove(&scancode),
                };
                if changed {
                    let result = self.driver.emit_key(scancode, direction);
                    self.after_call("key", result);
                }
            }
            InjectCommand::Button(flag) => {
                let changed = if flag.is_down() {
                    self.held_buttons.insert(flag.button())
                } else {
                    self.held_buttons.remove(&flag.button())
                };
                if changed {
                    let result = self.driver.emit_button(flag);
                    self.after_call("button", result);
                }
            }
            InjectCommand::MoveAbs { x, y } => {
                let (nx, ny) = self.driver.virtual_desktop().normalize(x, y);
                let result = self.driver.emit_move_absolute(nx, ny);
                self.after_call("absolute move", result);
            }
            InjectCommand::MoveRel { dx, dy } => {
                let result = self.driver.emit_move_relative(dx, dy);
                self.after_call("relative move", result);
            }
        }
    }

    /// Releases every held key and button.  Held state is cleared even when
    /// the driver fails, so a second call is a no-op.
    fn release_all(&mut self) {
        if self.held_keys.is_empty() && self.held_buttons.is_empty() {
            return;
        }
        debug!(
            "releasing {} keys and {} buttons",
            self.held_keys.len(),
            self.held_buttons.len()
        );
        for scancode in std::mem::take(&mut self.held_keys) {
            let result = self.driver.emit_key(scancode, KeyDirection::Up);
            self.after_call("key release", result);
        }
        for button in std::mem::take(&mut self.held_buttons) {
            let result = self.driver.emit_button(ButtonFlag::up(button));
            self.after_call("button release", result);
        }
    }

    fn after_call(&self, what: &str, result: Result<(), DriverError>) {
        if let Err(e) = result {
            warn!("{what} injection failed: {e}");
        }
        if !self.pace.is_zero() {
            thread::sleep(self.pace);
        }
    }

    #[cfg(test)]
    pub(crate) fn held(&self) -> (Vec<u16>, Vec<MouseButton>) {
        (
            self.held_keys.iter().copied().collect(),
            self.held_buttons.iter().copied().collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::input_driver::mock::{DriverCall, RecordingDriver};
    use crossbeam_channel::bounded;

    fn worker_with(messages: Vec<BridgeMsg>) -> (Worker<RecordingDriver>, RecordingDriver) {
        let driver = RecordingDriver::new();
        let (tx, rx) = bounded(128);
        for msg in messages {
            tx.send(msg).unwrap();
        }
        drop(tx);
        (Worker::new(driver.clone(), rx, Duration::ZERO), driver)
    }

    fn inject(command: InjectCommand) -> BridgeMsg {
        BridgeMsg::Inject(command)
    }

    #[test]
    fn test_consecutive_moves_coalesce_up_to_next_key() {
        // Arrange
        let (worker, driver) = worker_with(vec![
            inject(InjectCommand::MoveRel { dx: 1, dy: 1 }),
            inject(InjectCommand::MoveRel { dx: 2, dy: 0 }),
            inject(InjectCommand::MoveRel { dx: 0, dy: -3 }),
            inject(InjectCommand::key_down(0x11)),
            inject(InjectCommand::MoveRel { dx: 5, dy: 5 }),
            inject(InjectCommand::key_up(0x11)),
        ]);

        // Act
        worker.run();

        // Assert
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::MoveRelative(3, -2),
                DriverCall::Key(0x11, KeyDirection::Down),
                DriverCall::MoveRelative(5, 5),
                DriverCall::Key(0x11, KeyDirection::Up),
            ]
        );
    }

    #[test]
    fn test_moves_that_cancel_out_emit_nothing() {
        let (worker, driver) = worker_with(vec![
            inject(InjectCommand::MoveRel { dx: 4, dy: 0 }),
            inject(InjectCommand::MoveRel { dx: -4, dy: 0 }),
        ]);

        worker.run();

        assert!(driver.calls().is_empty());
    }

    #[test]
    fn test_unheld_releases_and_repeat_presses_are_skipped() {
        let (worker, driver) = worker_with(vec![
            inject(InjectCommand::key_up(0x1E)),
            inject(InjectCommand::Button(ButtonFlag::RightUp)),
            inject(InjectCommand::key_down(0x1E)),
            inject(InjectCommand::key_down(0x1E)),
            inject(InjectCommand::key_up(0x1E)),
        ]);

        worker.run();

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Key(0x1E, KeyDirection::Down),
                DriverCall::Key(0x1E, KeyDirection::Up),
            ]
        );
    }

    #[test]
    fn test_release_all_releases_every_held_input_once() {
        // Arrange
        let (ack_tx, ack_rx) = bounded(1);
        let (mut worker, driver) = worker_with(vec![
            inject(InjectCommand::key_down(0x20)),
            inject(InjectCommand::key_down(0x11)),
            inject(InjectCommand::Button(ButtonFlag::LeftDown)),
            BridgeMsg::ReleaseAll(ack_tx),
        ]);

        // Act
        for _ in 0..4 {
            assert_eq!(worker.step(), Step::Continue);
        }

        // Assert
        assert!(ack_rx.try_recv().is_ok());
        assert_eq!(worker.held(), (vec![], vec![]));
        assert_eq!(
            driver.calls()[3..],
            [
                DriverCall::Key(0x11, KeyDirection::Up),
                DriverCall::Key(0x20, KeyDirection::Up),
                DriverCall::Button(ButtonFlag::LeftUp),
            ]
        );
        // Queue closed: nothing left to release.
        assert_eq!(worker.step(), Step::Exit);
        assert_eq!(driver.calls().len(), 6);
    }

    #[test]
    fn test_stop_releases_before_exit() {
        let (mut worker, driver) = worker_with(vec![
            inject(InjectCommand::key_down(0x39)),
            BridgeMsg::Stop,
            inject(InjectCommand::key_down(0x1F)),
        ]);

        assert_eq!(worker.step(), Step::Continue);
        assert_eq!(worker.step(), Step::Exit);

        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Key(0x39, KeyDirection::Down),
                DriverCall::Key(0x39, KeyDirection::Up),
            ]
        );
    }

    #[test]
    fn test_absolute_move_is_normalised() {
        let (worker, driver) = worker_with(vec![inject(InjectCommand::MoveAbs { x: 1919, y: 0 })]);

        worker.run();

        assert_eq!(driver.calls(), vec![DriverCall::MoveAbsolute(65_535, 0)]);
    }

    #[test]
    fn test_driver_failure_still_clears_held_state() {
        let mut driver = RecordingDriver::new();
        driver.should_fail = true;
        let (tx, rx) = bounded(8);
        tx.send(inject(InjectCommand::key_down(0x11))).unwrap();
        drop(tx);
        let mut worker = Worker::new(driver, rx, Duration::ZERO);

        assert_eq!(worker.step(), Step::Continue);
        assert_eq!(worker.held().0, vec![0x11]);
        assert_eq!(worker.step(), Step::Exit);
        assert_eq!(worker.held(), (vec![], vec![]));
    }

    /// Fixed-seed LCG so the interleaving is random-looking but repeatable.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: u64) -> u64 {
            self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (self.0 >> 33) % n
        }
    }

    fn random_commands(seed: u64, count: usize) -> Vec<InjectCommand> {
        const KEYS: [u16; 4] = [0x11, 0x1E, 0x1F, 0x20];
        const BUTTONS: [ButtonFlag; 4] = [
            ButtonFlag::LeftDown,
            ButtonFlag::LeftUp,
            ButtonFlag::RightDown,
            ButtonFlag::RightUp,
        ];
        let mut rng = Lcg(seed);
        (0..count)
            .map(|_| match rng.below(10) {
                0..=4 => InjectCommand::MoveRel {
                    dx: rng.below(21) as i32 - 10,
                    dy: rng.below(21) as i32 - 10,
                },
                5..=7 => {
                    let scancode = KEYS[rng.below(4) as usize];
                    if rng.below(2) == 0 {
                        InjectCommand::key_down(scancode)
                    } else {
                        InjectCommand::key_up(scancode)
                    }
                }
                _ => InjectCommand::Button(BUTTONS[rng.below(4) as usize]),
            })
            .collect()
    }

    /// What the worker must emit for `commands` queued up front and then
    /// the queue closing.
    fn expected_calls(commands: &[InjectCommand]) -> Vec<DriverCall> {
        let mut calls = Vec::new();
        let mut keys = BTreeSet::new();
        let mut buttons = BTreeSet::new();
        let mut run = (0, 0);
        let flush = |run: &mut (i32, i32), calls: &mut Vec<DriverCall>| {
            if *run != (0, 0) {
                calls.push(DriverCall::MoveRelative(run.0, run.1));
            }
            *run = (0, 0);
        };
        for command in commands {
            match *command {
                InjectCommand::MoveRel { dx, dy } => {
                    run.0 += dx;
                    run.1 += dy;
                    continue;
                }
                InjectCommand::Key { scancode, direction } => {
                    flush(&mut run, &mut calls);
                    let changed = match direction {
                        KeyDirection::Down => keys.insert(scancode),
                        KeyDirection::Up => keys.remove(&scancode),
                    };
                    if changed {
                        calls.push(DriverCall::Key(scancode, direction));
                    }
                }
                InjectCommand::Button(flag) => {
                    flush(&mut run, &mut calls);
                    let changed = if flag.is_down() {
                        buttons.insert(flag.button())
                    } else {
                        buttons.remove(&flag.button())
                    };
                    if changed {
                        calls.push(DriverCall::Button(flag));
                    }
                }
                InjectCommand::MoveAbs { .. } => unreachable!("not generated"),
            }
        }
        flush(&mut run, &mut calls);
        calls.extend(keys.into_iter().map(|sc| DriverCall::Key(sc, KeyDirection::Up)));
        calls.extend(buttons.into_iter().map(|b| DriverCall::Button(ButtonFlag::up(b))));
        calls
    }

    #[test]
    fn test_random_interleavings_keep_order_and_balance() {
        for seed in [1, 7, 42, 0xdead_beef] {
            // Arrange
            let commands = random_commands(seed, 600);
            let driver = RecordingDriver::new();
            let (tx, rx) = bounded(commands.len());
            for command in &commands {
                tx.send(inject(*command)).unwrap();
            }
            drop(tx);

            // Act
            Worker::new(driver.clone(), rx, Duration::ZERO).run();

            // Assert
            let calls = driver.calls();
            assert_eq!(calls, expected_calls(&commands), "seed {seed}");

            let mut balance: std::collections::HashMap<String, i32> = Default::default();
            for call in &calls {
                match call {
                    DriverCall::Key(sc, dir) => {
                        *balance.entry(format!("key {sc:#x}")).or_default() +=
                            if *dir == KeyDirection::Down { 1 } else { -1 };
                    }
                    DriverCall::Button(flag) => {
                        *balance.entry(format!("{:?}", flag.button())).or_default() +=
                            if flag.is_down() { 1 } else { -1 };
                    }
                    _ => {}
                }
                assert!(balance.values().all(|&b| b == 0 || b == 1), "seed {seed}: double press");
            }
            assert!(balance.values().all(|&b| b == 0), "seed {seed}: {balance:?}");
        }
    }
}
