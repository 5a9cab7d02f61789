//! In-memory geometry and calibration services and the JSON setup file.
#![allow(clippy::cast_precision_loss)]

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use trdlet_core::constants::{
    self, AMPLIFICATION_HEIGHT, CATHODE_HEIGHT, NCHAMBER, NLAYER, NSTACK,
};
use trdlet_core::{Affine3, DriftCalibration, Geometry, PadPlane, TimingCalibration};

use crate::{Error, Result, TransformerConfig};

/// Geometry of a single chamber.
#[derive(Debug, Clone, PartialEq)]
pub struct ChamberGeometry {
    pub pad_plane: PadPlane,
    pub local_to_global: Affine3,
}

impl ChamberGeometry {
    #[must_use]
    pub fn new(pad_plane: PadPlane, local_to_global: Affine3) -> Self {
        Self {
            pad_plane,
            local_to_global,
        }
    }
}

/// Geometry service backed by a per-detector table.
#[derive(Debug, Clone)]
pub struct GeometryTable {
    cathode_height: f64,
    amplification_height: f64,
    chambers: Vec<Option<ChamberGeometry>>,
}

impl Default for GeometryTable {
    fn default() -> Self {
        Self::nominal()
    }
}

impl GeometryTable {
    /// Nominal pad widths per layer (cm).
    const PAD_WIDTH: [f64; NLAYER] = [0.635, 0.665, 0.695, 0.725, 0.755, 0.785];
    /// Length of the inner pad rows (cm).
    const INNER_ROW_LENGTH: f64 = 9.0;
    /// Length of the first and last pad rows (cm).
    const OUTER_ROW_LENGTH: f64 = 8.0;
    /// Gap between neighbouring stacks (cm).
    const STACK_GAP: f64 = 2.0;
    /// Tracking-frame x of the anode plane of layer 0 (cm).
    const LAYER0_RADIUS: f64 = 300.0;
    /// Radial spacing of layers (cm).
    const LAYER_PITCH: f64 = 12.6;

    /// Creates an empty table with the given chamber heights.
    #[must_use]
    pub fn new(cathode_height: f64, amplification_height: f64) -> Self {
        Self {
            cathode_height,
            amplification_height,
            chambers: Vec::new(),
        }
    }

    /// Nominal layout of all chambers.
    ///
    /// Every slot gets a chamber, including those without a physical
    /// chamber in the detector. Tracking-frame matrices translate by the
    /// layer radius and the stack z centre.
    #[must_use]
    pub fn nominal() -> Self {
        let stack_length = |stack: usize| {
            let rows = constants::row_count(stack);
            2.0 * Self::OUTER_ROW_LENGTH + (rows - 2) as f64 * Self::INNER_ROW_LENGTH
        };
        // stack 2 is centred on z = 0, stacks 0/1 are on the +z side
        let mut stack_z = [0.0; NSTACK];
        for stack in (0..2).rev() {
            stack_z[stack] = stack_z[stack + 1]
                + (stack_length(stack) + stack_length(stack + 1)) / 2.0
                + Self::STACK_GAP;
        }
        for stack in 3..NSTACK {
            stack_z[stack] = -stack_z[NSTACK - 1 - stack];
        }

        let mut table = Self::new(CATHODE_HEIGHT, AMPLIFICATION_HEIGHT);
        table.chambers = (0..NCHAMBER)
            .map(|det| {
                #[allow(clippy::cast_possible_truncation)]
                let det = det as u16;
                let (stack, layer) = (constants::stack(det), constants::layer(det));
                let rows = constants::row_count(stack);
                let row_size = (0..rows)
                    .map(|row| {
                        if row == 0 || row == rows - 1 {
                            Self::OUTER_ROW_LENGTH
                        } else {
                            Self::INNER_ROW_LENGTH
                        }
                    })
                    .collect();
                let radius = Self::LAYER0_RADIUS + layer as f64 * Self::LAYER_PITCH;
                Some(ChamberGeometry::new(
                    PadPlane::from_row_sizes(Self::PAD_WIDTH[layer], row_size),
                    Affine3::translation(radius, 0.0, stack_z[stack]),
                ))
            })
            .collect();
        table
    }

    /// Adds or replaces a chamber.
    pub fn insert(&mut self, detector: u16, chamber: ChamberGeometry) {
        let slot = usize::from(detector);
        if slot >= self.chambers.len() {
            self.chambers.resize(slot + 1, None);
        }
        self.chambers[slot] = Some(chamber);
    }

    /// Builder form of [`GeometryTable::insert`].
    #[must_use]
    pub fn with_chamber(mut self, detector: u16, chamber: ChamberGeometry) -> Self {
        self.insert(detector, chamber);
        self
    }

    /// Chamber entry of a detector.
    #[must_use]
    pub fn chamber(&self, detector: u16) -> Option<&ChamberGeometry> {
        self.chambers.get(usize::from(detector))?.as_ref()
    }

    /// Number of chambers present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chambers.iter().filter(|c| c.is_some()).count()
    }

    /// Returns true if no chamber is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Geometry for GeometryTable {
    fn pad_plane(&self, detector: u16) -> Option<&PadPlane> {
        self.chamber(detector).map(|c| &c.pad_plane)
    }

    fn local_to_global(&self, detector: u16) -> Option<&Affine3> {
        self.chamber(detector).map(|c| &c.local_to_global)
    }

    fn cathode_height(&self) -> f64 {
        self.cathode_height
    }

    fn amplification_height(&self) -> f64 {
        self.amplification_height
    }
}

/// Calibration service backed by defaults plus per-chamber overrides.
#[derive(Debug, Clone)]
pub struct CalibrationTable {
    default_vdrift: f32,
    default_exb: f32,
    default_t0: f32,
    vdrift: HashMap<u16, f32>,
    exb: HashMap<u16, f32>,
    t0: HashMap<u16, f32>,
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::uniform(Self::NOMINAL_VDRIFT, 0.0, 0.0)
    }
}

impl CalibrationTable {
    /// Nominal drift velocity (cm/us).
    pub const NOMINAL_VDRIFT: f32 = 1.546;

    /// Same values for every chamber and region.
    #[must_use]
    pub fn uniform(vdrift: f32, exb: f32, t0: f32) -> Self {
        Self {
            default_vdrift: vdrift,
            default_exb: exb,
            default_t0: t0,
            vdrift: HashMap::new(),
            exb: HashMap::new(),
            t0: HashMap::new(),
        }
    }

    /// Overrides drift velocity and Lorentz angle of one chamber.
    #[must_use]
    pub fn with_drift(mut self, detector: u16, vdrift: f32, exb: f32) -> Self {
        self.vdrift.insert(detector, vdrift);
        self.exb.insert(detector, exb);
        self
    }

    /// Overrides the t0 of one region.
    #[must_use]
    pub fn with_t0(mut self, region: u16, t0: f32) -> Self {
        self.t0.insert(region, t0);
        self
    }
}

impl DriftCalibration for CalibrationTable {
    fn drift_velocity(&self, detector: u16) -> f32 {
        self.vdrift
            .get(&detector)
            .copied()
            .unwrap_or(self.default_vdrift)
    }

    fn exb(&self, detector: u16) -> f32 {
        self.exb.get(&detector).copied().unwrap_or(self.default_exb)
    }
}

impl TimingCalibration for CalibrationTable {
    fn t0(&self, region: u16) -> f32 {
        self.t0.get(&region).copied().unwrap_or(self.default_t0)
    }
}

/// Geometry, calibration and transformer configuration loaded together.
#[derive(Debug, Clone, Default)]
pub struct Setup {
    pub geometry: GeometryTable,
    pub calibration: CalibrationTable,
    pub transformer: TransformerConfig,
}

// Intermediate structs for the JSON setup schema
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonSetup {
    geometry: Option<JsonGeometry>,
    #[serde(default)]
    calibration: JsonCalibration,
    #[serde(default)]
    transformer: TransformerConfig,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonGeometry {
    cathode_height: f64,
    amplification_height: f64,
    chambers: Vec<JsonChamber>,
}

impl Default for JsonGeometry {
    fn default() -> Self {
        Self {
            cathode_height: CATHODE_HEIGHT,
            amplification_height: AMPLIFICATION_HEIGHT,
            chambers: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct JsonChamber {
    detector: u16,
    pad_width: f64,
    row_sizes: Vec<f64>,
    row_positions: Option<Vec<f64>>,
    /// Row-major `[R | t]`; identity if absent.
    matrix: Option<[[f64; 4]; 3]>,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonCalibration {
    vdrift: f32,
    exb: f32,
    t0: f32,
    chambers: Vec<JsonChamberCalibration>,
    t0_regions: Vec<JsonT0Region>,
}

impl Default for JsonCalibration {
    fn default() -> Self {
        Self {
            vdrift: CalibrationTable::NOMINAL_VDRIFT,
            exb: 0.0,
            t0: 0.0,
            chambers: Vec::new(),
            t0_regions: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct JsonChamberCalibration {
    detector: u16,
    vdrift: Option<f32>,
    exb: Option<f32>,
}

#[derive(Deserialize)]
struct JsonT0Region {
    region: u16,
    t0: f32,
}

impl Setup {
    /// Load a setup from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json: JsonSetup = serde_json::from_reader(reader)?;
        Self::from_json_setup(json)
    }

    /// Load a setup from a JSON string.
    ///
    /// A missing `geometry` section selects the nominal geometry; missing
    /// calibration values take nominal defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the string cannot be parsed or validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonSetup = serde_json::from_str(json)?;
        Self::from_json_setup(json)
    }

    fn from_json_setup(json: JsonSetup) -> Result<Self> {
        json.transformer.validate()?;

        let geometry = match json.geometry {
            Some(geometry) => Self::geometry_from_json(geometry)?,
            None => GeometryTable::nominal(),
        };

        let cal = json.calibration;
        if !(cal.vdrift.is_finite() && cal.vdrift > 0.0) {
            return Err(Error::InvalidSetup(format!(
                "default drift velocity must be positive, got {}",
                cal.vdrift
            )));
        }
        let mut calibration = CalibrationTable::uniform(cal.vdrift, cal.exb, cal.t0);
        for chamber in cal.chambers {
            let vdrift = chamber.vdrift.unwrap_or(cal.vdrift);
            if !(vdrift.is_finite() && vdrift > 0.0) {
                return Err(Error::InvalidSetup(format!(
                    "detector {}: drift velocity must be positive, got {vdrift}",
                    chamber.detector
                )));
            }
            calibration =
                calibration.with_drift(chamber.detector, vdrift, chamber.exb.unwrap_or(cal.exb));
        }
        for region in cal.t0_regions {
            calibration = calibration.with_t0(region.region, region.t0);
        }

        Ok(Self {
            geometry,
            calibration,
            transformer: json.transformer,
        })
    }

    fn geometry_from_json(json: JsonGeometry) -> Result<GeometryTable> {
        let mut table = GeometryTable::new(json.cathode_height, json.amplification_height);
        for chamber in json.chambers {
            let det = chamber.detector;
            if usize::from(det) >= NCHAMBER {
                return Err(Error::InvalidSetup(format!(
                    "detector {det} out of range (0..{NCHAMBER})"
                )));
            }
            if chamber.row_sizes.is_empty() {
                return Err(Error::InvalidSetup(format!("detector {det}: no pad rows")));
            }
            if chamber.pad_width <= 0.0 {
                return Err(Error::InvalidSetup(format!(
                    "detector {det}: pad width must be positive, got {}",
                    chamber.pad_width
                )));
            }
            let pad_plane = match chamber.row_positions {
                Some(row_pos) => PadPlane::new(chamber.pad_width, row_pos, chamber.row_sizes)
                    .ok_or_else(|| {
                        Error::InvalidSetup(format!(
                            "detector {det}: row_positions and row_sizes differ in length"
                        ))
                    })?,
                None => PadPlane::from_row_sizes(chamber.pad_width, chamber.row_sizes),
            };
            let matrix = chamber.matrix.map_or_else(Affine3::identity, Affine3::from_rows);
            // validate once at load time, not per tracklet
            if matrix.inverse().is_none() {
                return Err(Error::InvalidSetup(format!(
                    "detector {det}: local-to-global matrix is singular"
                )));
            }
            table.insert(det, ChamberGeometry::new(pad_plane, matrix));
        }
        Ok(table)
    }
}
