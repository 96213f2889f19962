//! Staging area for wire values.
//!
//! Items are copied byte-for-byte into fixed-size slots, then converted into
//! a [`RobotState`] in one pass. Only the decoding thread touches this.

use std::slice;

use crate::binding::Field;
use crate::state::RobotState;

type F32Bytes = [u8; 4];

#[derive(Debug, Clone, Default)]
pub(crate) struct RawState {
    robot_link: u8,
    robot_error: u8,
    project_run: u8,
    project_pause: u8,
    safeguard_a: u8,
    estop: u8,
    camera_light: u8,
    error_code: [u8; 4],

    joint_angle: [u8; 24],
    flange_pose: [u8; 24],
    tool_pose: [u8; 24],

    tcp_force: [u8; 12],
    tcp_force_3d: F32Bytes,
    tcp_speed: [u8; 24],
    tcp_speed_3d: F32Bytes,
    joint_speed: [u8; 24],
    joint_torque: [u8; 24],

    project_speed: [u8; 4],
    ma_mode: [u8; 4],
    robot_light: [u8; 4],

    ctrl_do: [u8; 16],
    ctrl_di: [u8; 16],
    ctrl_ao: [F32Bytes; 2],
    ctrl_ai: [F32Bytes; 2],
    end_do: [u8; 4],
    end_di: [u8; 4],
    end_ao: [F32Bytes; 2],
    end_ai: [F32Bytes; 2],
}

impl RawState {
    /// The destination bytes for `field`, or `None` for an out-of-range index.
    pub(crate) fn slot_mut(&mut self, field: Field) -> Option<&mut [u8]> {
        let slot: &mut [u8] = match field {
            Field::RobotLink => slice::from_mut(&mut self.robot_link),
            Field::RobotError => slice::from_mut(&mut self.robot_error),
            Field::ProjectRun => slice::from_mut(&mut self.project_run),
            Field::ProjectPause => slice::from_mut(&mut self.project_pause),
            Field::SafeguardA => slice::from_mut(&mut self.safeguard_a),
            Field::Estop => slice::from_mut(&mut self.estop),
            Field::CameraLight => slice::from_mut(&mut self.camera_light),
            Field::ErrorCode => &mut self.error_code,
            Field::JointAngle => &mut self.joint_angle,
            Field::FlangePose => &mut self.flange_pose,
            Field::ToolPose => &mut self.tool_pose,
            Field::TcpForce => &mut self.tcp_force,
            Field::TcpForce3D => &mut self.tcp_force_3d,
            Field::TcpSpeed => &mut self.tcp_speed,
            Field::TcpSpeed3D => &mut self.tcp_speed_3d,
            Field::JointSpeed => &mut self.joint_speed,
            Field::JointTorque => &mut self.joint_torque,
            Field::ProjectSpeed => &mut self.project_speed,
            Field::MaMode => &mut self.ma_mode,
            Field::RobotLight => &mut self.robot_light,
            Field::CtrlDo(i) => slice::from_mut(self.ctrl_do.get_mut(usize::from(i))?),
            Field::CtrlDi(i) => slice::from_mut(self.ctrl_di.get_mut(usize::from(i))?),
            Field::CtrlAo(i) => self.ctrl_ao.get_mut(usize::from(i))?,
            Field::CtrlAi(i) => self.ctrl_ai.get_mut(usize::from(i))?,
            Field::EndDo(i) => slice::from_mut(self.end_do.get_mut(usize::from(i))?),
            Field::EndDi(i) => slice::from_mut(self.end_di.get_mut(usize::from(i))?),
            Field::EndAo(i) => self.end_ao.get_mut(usize::from(i))?,
            Field::EndAi(i) => self.end_ai.get_mut(usize::from(i))?,
        };
        Some(slot)
    }

    /// Convert every staged value into `state`.
    pub(crate) fn publish(&self, state: &mut RobotState) {
        state.is_linked = self.robot_link != 0;
        state.has_error = self.robot_error != 0;
        state.project_running = self.project_run != 0;
        state.project_paused = self.project_pause != 0;
        state.safeguard_a_triggered = self.safeguard_a != 0;
        state.estop_pressed = self.estop != 0;
        state.camera_light = self.camera_light;
        state.error_code = i32::from_le_bytes(self.error_code);

        state.joint_angle = floats(&self.joint_angle).map(f64::to_radians);
        state.flange_pose = si_pose(floats(&self.flange_pose));
        state.tool_pose = si_pose(floats(&self.tool_pose));

        state.tcp_force_vec = floats(&self.tcp_force);
        state.tcp_force = f64::from(f32::from_le_bytes(self.tcp_force_3d));
        state.tcp_speed_vec = si_pose(floats(&self.tcp_speed));
        state.tcp_speed = meters(f64::from(f32::from_le_bytes(self.tcp_speed_3d)));
        state.joint_speed = floats(&self.joint_speed).map(f64::to_radians);
        state.joint_torque = floats(&self.joint_torque).map(meters);

        state.project_speed = i32::from_le_bytes(self.project_speed);
        state.ma_mode = i32::from_le_bytes(self.ma_mode);
        state.robot_light = i32::from_le_bytes(self.robot_light);

        state.ctrl_do = self.ctrl_do;
        state.ctrl_di = self.ctrl_di;
        state.ctrl_ao = self.ctrl_ao.map(f32::from_le_bytes);
        state.ctrl_ai = self.ctrl_ai.map(f32::from_le_bytes);
        state.end_do = self.end_do;
        state.end_di = self.end_di;
        state.end_ao = self.end_ao.map(f32::from_le_bytes);
        state.end_ai = self.end_ai.map(f32::from_le_bytes);
    }
}

fn floats<const N: usize>(raw: &[u8]) -> [f64; N] {
    let mut out = [0.0; N];
    for (dst, chunk) in out.iter_mut().zip(raw.chunks_exact(4)) {
        if let Ok(bytes) = F32Bytes::try_from(chunk) {
            *dst = f64::from(f32::from_le_bytes(bytes));
        }
    }
    out
}

fn meters(mm: f64) -> f64 {
    mm * 0.001
}

/// `[mm, mm, mm, deg, deg, deg]` to `[m, m, m, rad, rad, rad]`.
fn si_pose(pose: [f64; 6]) -> [f64; 6] {
    let mut out = pose;
    for v in &mut out[..3] {
        *v = meters(*v);
    }
    for v in &mut out[3..] {
        *v = v.to_radians();
    }
    out
}
