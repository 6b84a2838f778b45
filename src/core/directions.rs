use anyhow::{bail, Result};

use crate::config::Config;

/// Viewing direction in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub yaw: i32,
    pub pitch: i32,
    pub roll: i32,
}

impl Direction {
    pub const fn new(yaw: i32, pitch: i32, roll: i32) -> Self {
        Self { yaw, pitch, roll }
    }

    /// ffmpeg `v360` filter string projecting an equirect input onto a flat
    /// view in this direction.
    pub fn v360_filter(&self, config: &Config) -> String {
        let opts = [
            "input=e".to_string(),
            "output=rectilinear".to_string(),
            format!("h_fov={}", config.horizontal_fov),
            format!("v_fov={}", config.vertical_fov),
            format!("w={}", config.perspective_width),
            format!("h={}", config.perspective_height),
            format!("yaw={}", self.yaw),
            format!("pitch={}", self.pitch),
            format!("roll={}", self.roll),
        ];
        format!("v360={}", opts.join(":"))
    }
}

const RC14: [Direction; 14] = [
    Direction::new(0, 90, 0),
    Direction::new(0, -90, 0),
    Direction::new(-90, 0, 0),
    Direction::new(0, 0, 0),
    Direction::new(90, 0, 0),
    Direction::new(180, 0, 0),
    Direction::new(-135, 45, 0),
    Direction::new(-45, 45, 0),
    Direction::new(45, 45, 0),
    Direction::new(135, 45, 0),
    Direction::new(-135, -45, 0),
    Direction::new(-45, -45, 0),
    Direction::new(45, -45, 0),
    Direction::new(135, -45, 0),
];

/// Named list of directions sampled from every input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    pub directions: Vec<Direction>,
}

impl Preset {
    /// Poles, the four cardinal directions, and eight diagonals at ±45°.
    pub fn rc14() -> Self {
        Self {
            name: "rc14".to_string(),
            directions: RC14.to_vec(),
        }
    }

    /// Poles plus rings at pitch 0, +45 and -45 sampled every `step` degrees.
    pub fn dense(step: u32) -> Result<Self> {
        if step == 0 || step > 360 {
            bail!("Ring step must be between 1 and 360 degrees (got {step})");
        }

        let ring = |pitch: i32| {
            (0..360)
                .step_by(step as usize)
                .map(move |yaw: i32| {
                    let yaw = if yaw <= 180 { yaw } else { yaw - 360 };
                    Direction::new(yaw, pitch, 0)
                })
        };

        let mut directions = vec![Direction::new(0, 90, 0), Direction::new(0, -90, 0)];
        directions.extend(ring(0));
        directions.extend(ring(45));
        directions.extend(ring(-45));

        Ok(Self {
            name: format!("dense{step}"),
            directions,
        })
    }

    pub fn select(dense: bool, ring_step: u32) -> Result<Self> {
        if dense {
            Self::dense(ring_step)
        } else {
            Ok(Self::rc14())
        }
    }

    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// Zero-pad width for direction indices.
    pub fn index_width(&self) -> usize {
        self.len().to_string().len()
    }

    /// `<base>_<preset>_<idx>_yaw<±Y>_pit<±P>_rol<±R>.jpg`. Other tools
    /// locate outputs by this name.
    pub fn output_file_name(&self, base: &str, index: usize) -> String {
        let d = self.directions[index];
        format!(
            "{base}_{name}_{index:0width$}_yaw{yaw:+}_pit{pitch:+}_rol{roll:+}.jpg",
            name = self.name,
            width = self.index_width(),
            yaw = d.yaw,
            pitch = d.pitch,
            roll = d.roll,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rc14_has_fourteen_fixed_directions() {
        let preset = Preset::rc14();
        assert_eq!(preset.len(), 14);
        assert_eq!(preset.directions[0], Direction::new(0, 90, 0));
        assert_eq!(preset.directions[5], Direction::new(180, 0, 0));
        assert_eq!(preset.directions[13], Direction::new(135, -45, 0));
    }

    #[test]
    fn dense_count_is_two_plus_three_rings() {
        for step in [30u32, 45, 60, 90, 7, 360, 1] {
            let preset = Preset::dense(step).unwrap();
            let per_ring = 360u32.div_ceil(step) as usize;
            assert_eq!(preset.len(), 2 + 3 * per_ring, "step {step}");
        }
    }

    #[test]
    fn dense_wraps_yaw_into_signed_range() {
        let preset = Preset::dense(90).unwrap();
        let yaws: Vec<i32> = preset.directions[2..6].iter().map(|d| d.yaw).collect();
        assert_eq!(yaws, vec![0, 90, 180, -90]);
        assert_eq!(preset.name, "dense90");
        assert!(preset.directions[6..10].iter().all(|d| d.pitch == 45));
        assert!(preset.directions[10..].iter().all(|d| d.pitch == -45));
    }

    #[test]
    fn dense_rejects_out_of_range_steps() {
        assert!(Preset::dense(0).is_err());
        assert!(Preset::dense(361).is_err());
    }

    #[test]
    fn output_names_encode_index_and_signed_angles() {
        let preset = Preset::rc14();
        assert_eq!(
            preset.output_file_name("frame_000000", 0),
            "frame_000000_rc14_00_yaw+0_pit+90_rol+0.jpg"
        );
        assert_eq!(
            preset.output_file_name("frame_000000", 10),
            "frame_000000_rc14_10_yaw-135_pit-45_rol+0.jpg"
        );

        let dense = Preset::dense(30).unwrap();
        assert_eq!(dense.len(), 38);
        assert_eq!(
            dense.output_file_name("f", 3),
            "f_dense30_03_yaw+30_pit+0_rol+0.jpg"
        );
    }

    #[test]
    fn v360_filter_carries_projection_and_angles() {
        let config = Config::default();
        let filter = Direction::new(-45, 45, 0).v360_filter(&config);
        assert_eq!(
            filter,
            "v360=input=e:output=rectilinear:h_fov=90:v_fov=90:w=1024:h=1024:yaw=-45:pitch=45:roll=0"
        );
    }
}
