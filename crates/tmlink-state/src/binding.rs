//! Wire item names and the fields they fill.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Number of controller digital outputs/inputs.
pub const CTRL_DIGITAL: u8 = 16;
/// Number of end-effector digital outputs/inputs.
pub const END_DIGITAL: u8 = 4;
/// Number of analog channels per bank.
pub const ANALOG: u8 = 2;

/// A destination in the staged state. Scalar variants are named after
/// their wire item; IO variants carry the channel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    RobotLink,
    RobotError,
    ProjectRun,
    ProjectPause,
    SafeguardA,
    Estop,
    CameraLight,
    ErrorCode,
    JointAngle,
    FlangePose,
    ToolPose,
    TcpForce,
    TcpForce3D,
    TcpSpeed,
    TcpSpeed3D,
    JointSpeed,
    JointTorque,
    ProjectSpeed,
    MaMode,
    RobotLight,
    /// Control box digital output channel.
    CtrlDo(u8),
    /// Control box digital input channel.
    CtrlDi(u8),
    /// Control box analog output channel.
    CtrlAo(u8),
    /// Control box analog input channel.
    CtrlAi(u8),
    /// End module digital output channel.
    EndDo(u8),
    /// End module digital input channel.
    EndDi(u8),
    /// End module analog output channel.
    EndAo(u8),
    /// End module analog input channel.
    EndAi(u8),
}

/// Where a named item is copied and whether its absence is worth a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Destination slot.
    pub field: Field,
    /// Warn when a learned record lacks this item.
    pub required: bool,
}

const NAMED: &[(&str, Field, bool)] = &[
    ("Robot_Link", Field::RobotLink, false),
    ("Robot_Error", Field::RobotError, true),
    ("Project_Run", Field::ProjectRun, false),
    ("Project_Pause", Field::ProjectPause, false),
    ("Safeguard_A", Field::SafeguardA, false),
    ("ESTOP", Field::Estop, false),
    ("Camera_Light", Field::CameraLight, false),
    ("Error_Code", Field::ErrorCode, false),
    ("Joint_Angle", Field::JointAngle, true),
    ("Coord_Robot_Flange", Field::FlangePose, false),
    ("Coord_Robot_Tool", Field::ToolPose, true),
    ("TCP_Force", Field::TcpForce, false),
    ("TCP_Force3D", Field::TcpForce3D, false),
    ("TCP_Speed", Field::TcpSpeed, false),
    ("TCP_Speed3D", Field::TcpSpeed3D, false),
    ("Joint_Speed", Field::JointSpeed, false),
    ("Joint_Torque", Field::JointTorque, false),
    ("Project_Speed", Field::ProjectSpeed, false),
    ("MA_Mode", Field::MaMode, false),
    ("Robot_Light", Field::RobotLight, false),
];

const INDEXED: &[(&str, fn(u8) -> Field, u8)] = &[
    ("Ctrl_DO", Field::CtrlDo, CTRL_DIGITAL),
    ("Ctrl_DI", Field::CtrlDi, CTRL_DIGITAL),
    ("Ctrl_AO", Field::CtrlAo, ANALOG),
    ("Ctrl_AI", Field::CtrlAi, ANALOG),
    ("End_DO", Field::EndDo, END_DIGITAL),
    ("End_DI", Field::EndDi, END_DIGITAL),
    ("End_AO", Field::EndAo, ANALOG),
    ("End_AI", Field::EndAi, ANALOG),
];

/// The binding table, built on first use.
pub fn bindings() -> &'static HashMap<String, Binding> {
    static TABLE: OnceLock<HashMap<String, Binding>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for &(name, field, required) in NAMED {
            table.insert(name.to_string(), Binding { field, required });
        }
        for &(prefix, field, count) in INDEXED {
            for i in 0..count {
                table.insert(
                    format!("{prefix}{i}"),
                    Binding {
                        field: field(i),
                        required: false,
                    },
                );
            }
        }
        table
    })
}

/// Look up the binding for a wire item name.
pub fn lookup(name: &str) -> Option<Binding> {
    bindings().get(name).copied()
}

/// Names of every required item.
pub fn required_names() -> impl Iterator<Item = &'static str> {
    NAMED
        .iter()
        .filter(|(_, _, required)| *required)
        .map(|(name, _, _)| *name)
}
