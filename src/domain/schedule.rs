// Realized schedule entities produced from a solver solution

use serde::Serialize;

/// A (surgery, day, room, doctor, risk-level) tuple, by index into the instance
/// and the configured alpha choices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Combo {
    pub surgery: usize,
    pub day: usize,
    pub room: usize,
    pub doctor: usize,
    pub risk: usize,
}

impl Combo {
    pub fn new(surgery: usize, day: usize, room: usize, doctor: usize, risk: usize) -> Self {
        Self {
            surgery,
            day,
            room,
            doctor,
            risk,
        }
    }
}

/// One scheduled surgery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub combo: Combo,
    pub surgery_id: String,
    pub day_id: String,
    pub room_id: String,
    pub doctor_id: String,
    pub alpha: f64,
    pub buffered_duration: f64,
    /// Start time on the room timeline, minutes from the start of the day
    pub start: f64,
    /// Start time on the doctor timeline
    pub doctor_start: f64,
}

impl Assignment {
    pub fn end(&self) -> f64 {
        self.start + self.buffered_duration
    }

    pub fn doctor_end(&self) -> f64 {
        self.doctor_start + self.buffered_duration
    }
}

/// Overtime minutes, indexed `[day][room]` and `[day][doctor]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OvertimeUsage {
    pub room: Vec<Vec<f64>>,
    pub doctor: Vec<Vec<f64>>,
}

impl OvertimeUsage {
    pub fn total_room(&self) -> f64 {
        self.room.iter().flatten().sum()
    }

    pub fn total_doctor(&self) -> f64 {
        self.doctor.iter().flatten().sum()
    }
}

/// A schedule reconstructed from a solver solution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub assignments: Vec<Assignment>,
    pub overtime: OvertimeUsage,
    /// Regular minutes left unused, summed over (day, room)
    pub idle_time: f64,
    pub expected_surgeries: usize,
}

impl Schedule {
    /// Number of distinct surgeries that received at least one assignment.
    pub fn assigned_surgeries(&self) -> usize {
        let mut seen: Vec<usize> = self.assignments.iter().map(|a| a.combo.surgery).collect();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }

    pub fn is_complete(&self) -> bool {
        self.assigned_surgeries() == self.expected_surgeries
    }

    pub fn on_day(&self, day: usize) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.combo.day == day)
    }
}
