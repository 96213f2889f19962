use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

/// Joint count.
pub const DOF: usize = 6;

/// Published robot state in SI units.
///
/// Angles are radians, lengths meters. Poses are `[x, y, z, rx, ry, rz]`.
/// IO values are copied verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RobotState {
    /// The controller reports a live link.
    pub is_linked: bool,
    /// The controller is in an error state; see `error_code`.
    pub has_error: bool,
    /// A project is running.
    pub project_running: bool,
    /// The running project is paused.
    pub project_paused: bool,
    /// Safeguard port A is triggered.
    pub safeguard_a_triggered: bool,
    /// The emergency stop is pressed.
    pub estop_pressed: bool,
    /// Camera light level.
    pub camera_light: u8,
    /// Last controller error code.
    pub error_code: i32,

    /// Joint angles, radians.
    pub joint_angle: [f64; DOF],
    /// Flange pose in the robot base frame.
    pub flange_pose: [f64; 6],
    /// Tool center point pose in the robot base frame.
    pub tool_pose: [f64; 6],

    /// TCP force components, newtons.
    pub tcp_force_vec: [f64; 3],
    /// TCP force magnitude, newtons.
    pub tcp_force: f64,
    /// TCP velocity: linear in m/s, angular in rad/s.
    pub tcp_speed_vec: [f64; 6],
    /// TCP linear speed, m/s.
    pub tcp_speed: f64,
    /// Joint speeds, rad/s.
    pub joint_speed: [f64; DOF],
    /// Joint torques, newton meters.
    pub joint_torque: [f64; DOF],

    /// Project speed override, percent.
    pub project_speed: i32,
    /// Manual/auto mode indicator.
    pub ma_mode: i32,
    /// Indicator light state.
    pub robot_light: i32,

    // IO banks, verbatim.
    pub ctrl_do: [u8; 16],
    pub ctrl_di: [u8; 16],
    pub ctrl_ao: [f32; 2],
    pub ctrl_ai: [f32; 2],
    pub end_do: [u8; 4],
    pub end_di: [u8; 4],
    pub end_ao: [f32; 2],
    pub end_ai: [f32; 2],
}

impl RobotState {
    /// Overwrite joint position, velocity and torque, e.g. from a simulator.
    pub fn set_joint_states(
        &mut self,
        angle: [f64; DOF],
        speed: [f64; DOF],
        torque: [f64; DOF],
    ) {
        self.joint_angle = angle;
        self.joint_speed = speed;
        self.joint_torque = torque;
    }
}

/// Cloneable handle to the state shared between the receiving thread and
/// any number of readers.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<RobotState>>,
}

impl SharedState {
    /// A handle to a default (all-zero) snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state. A poisoned lock is recovered; the state is plain data.
    pub fn lock(&self) -> MutexGuard<'_, RobotState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RobotState {
        self.lock().clone()
    }

    /// Run `f` against the state under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&RobotState) -> R) -> R {
        f(&self.lock())
    }

    /// Controller link flag.
    pub fn is_linked(&self) -> bool {
        self.with(|s| s.is_linked)
    }

    /// Controller error flag.
    pub fn has_error(&self) -> bool {
        self.with(|s| s.has_error)
    }

    /// Last controller error code.
    pub fn error_code(&self) -> i32 {
        self.with(|s| s.error_code)
    }

    /// Joint angles in radians.
    pub fn joint_angle(&self) -> [f64; DOF] {
        self.with(|s| s.joint_angle)
    }

    /// Tool pose: xyz in meters, rpy in radians.
    pub fn tool_pose(&self) -> [f64; 6] {
        self.with(|s| s.tool_pose)
    }

    /// Flange pose: xyz in meters, rpy in radians.
    pub fn flange_pose(&self) -> [f64; 6] {
        self.with(|s| s.flange_pose)
    }

    /// Joint speeds in radians per second.
    pub fn joint_speed(&self) -> [f64; DOF] {
        self.with(|s| s.joint_speed)
    }

    /// Joint torques in newton meters.
    pub fn joint_torque(&self) -> [f64; DOF] {
        self.with(|s| s.joint_torque)
    }

    /// Control box digital outputs.
    pub fn ctrl_do(&self) -> [u8; 16] {
        self.with(|s| s.ctrl_do)
    }

    /// Control box digital inputs.
    pub fn ctrl_di(&self) -> [u8; 16] {
        self.with(|s| s.ctrl_di)
    }

    /// End module digital outputs.
    pub fn end_do(&self) -> [u8; 4] {
        self.with(|s| s.end_do)
    }

    /// End module digital inputs.
    pub fn end_di(&self) -> [u8; 4] {
        self.with(|s| s.end_di)
    }
}
