//! Static part descriptions for the drone assembly.
//!
//! Keys match normalized part names exactly and are case-sensitive. Anything
//! unknown, including no selection at all, resolves to the default entry.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Description {
    pub title: &'static str,
    pub body: &'static str,
}

pub const DEFAULT_KEY: &str = "default";

pub const DEFAULT: Description = Description {
    title: "Drone Model",
    body: "Click on any component of the drone to view a detailed description and learn more about its function and role in the system.",
};

const ENTRIES: &[(&str, Description)] = &[
    (
        "battery",
        Description {
            title: "Tattu 5200mAh 14.8V 35C 4S1P LiPo Battery",
            body: "The primary power source for the drone. This 4-cell LiPo battery supplies electrical energy to the ESC, motors, flight controller, and other onboard components.",
        },
    ),
    (
        "esc",
        Description {
            title: "SpeedyBee BL32 32bit 50A 4-in-1 ESC",
            body: "An electronic speed controller (ESC) that regulates power to the four brushless motors based on flight controller commands. Enables precise control of motor speeds and thrust.",
        },
    ),
    (
        "frame",
        Description {
            title: "Pyrodrone Source One 7\" Frame Kit (V0.2 DeadCat Arms)",
            body: "A lightweight and durable carbon fiber frame that supports all components of the drone. Its 'DeadCat' arm configuration improves forward camera view by moving front propellers out of frame.",
        },
    ),
    (
        "FRSKY",
        Description {
            title: "FrSky XM+ SBUS Mini Radio Receiver",
            body: "A compact radio receiver that receives control signals from the pilot\u{2019}s FrSky-compatible transmitter and forwards them to the flight controller for manual flight control.",
        },
    ),
    (
        "motor1",
        Description {
            title: "BrotherHobby Avenger 2507 V2 Motor - 1500KV (Motor 1)",
            body: "A high-efficiency brushless DC motor responsible for driving Propeller 1 and contributing to lift, thrust, and maneuverability.",
        },
    ),
    (
        "motor2",
        Description {
            title: "BrotherHobby Avenger 2507 V2 Motor - 1500KV (Motor 2)",
            body: "A high-efficiency brushless DC motor responsible for driving Propeller 2 and contributing to lift, thrust, and maneuverability.",
        },
    ),
    (
        "motor3",
        Description {
            title: "BrotherHobby Avenger 2507 V2 Motor - 1500KV (Motor 3)",
            body: "A high-efficiency brushless DC motor responsible for driving Propeller 3 and contributing to lift, thrust, and maneuverability.",
        },
    ),
    (
        "motor4",
        Description {
            title: "BrotherHobby Avenger 2507 V2 Motor - 1500KV (Motor 4)",
            body: "A high-efficiency brushless DC motor responsible for driving Propeller 4 and contributing to lift, thrust, and maneuverability.",
        },
    ),
    (
        "prop1",
        Description {
            title: "HQ Prop Durable 7x4x3 Tri-Blade (Propeller 1)",
            body: "A durable tri-blade propeller designed to generate lift and assist with drone maneuvering. Driven by Motor 1.",
        },
    ),
    (
        "prop2",
        Description {
            title: "HQ Prop Durable 7x4x3 Tri-Blade (Propeller 2)",
            body: "A durable tri-blade propeller designed to generate lift and assist with drone maneuvering. Driven by Motor 2.",
        },
    ),
    (
        "prop3",
        Description {
            title: "HQ Prop Durable 7x4x3 Tri-Blade (Propeller 3)",
            body: "A durable tri-blade propeller designed to generate lift and assist with drone maneuvering. Driven by Motor 3.",
        },
    ),
    (
        "prop4",
        Description {
            title: "HQ Prop Durable 7x4x3 Tri-Blade (Propeller 4)",
            body: "A durable tri-blade propeller designed to generate lift and assist with drone maneuvering. Driven by Motor 4.",
        },
    ),
    // Spelling follows the part name baked into the model. This is the
    // telemetry radio, not the RC receiver.
    (
        "reciever",
        Description {
            title: "SiK Telemetry Radio V3 - 100mW/915MHz",
            body: "A telemetry radio module that provides real-time two-way data link between the drone and ground station software (e.g. Mission Planner), enabling monitoring of flight status, GPS position, and tuning parameters.",
        },
    ),
    (
        "teensy",
        Description {
            title: "Teensy 4.0 Microcontroller",
            body: "The central processing unit of the flight controller. The Teensy 4.0 runs the flight control firmware, processes IMU data, and generates motor commands.",
        },
    ),
    (
        "flight_controller_pcb",
        Description {
            title: "Custom Flight Controller PCB",
            body: "A custom-designed printed circuit board (PCB) that integrates the Teensy microcontroller, IMU, connectors, SD slot, and power management components required to control the drone\u{2019}s flight.",
        },
    ),
    (DEFAULT_KEY, DEFAULT),
];

/// Description for `name`, or the default entry when there is none.
pub fn lookup(name: Option<&str>) -> Description {
    name.and_then(|name| {
        ENTRIES
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, description)| *description)
    })
    .unwrap_or(DEFAULT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_keys_return_their_entry() {
        assert_eq!(
            lookup(Some("flight_controller_pcb")).title,
            "Custom Flight Controller PCB"
        );
        assert_eq!(lookup(Some("teensy")).title, "Teensy 4.0 Microcontroller");
        assert_eq!(
            lookup(Some("reciever")).title,
            "SiK Telemetry Radio V3 - 100mW/915MHz"
        );
        assert_eq!(lookup(Some("default")), DEFAULT);
    }

    #[test]
    fn unknown_or_missing_names_fall_back_to_default() {
        assert_eq!(lookup(None), DEFAULT);
        assert_eq!(lookup(Some("")), DEFAULT);
        assert_eq!(lookup(Some("Unnamed part")), DEFAULT);
        assert_eq!(lookup(Some("Battery")), DEFAULT);
        assert_eq!(lookup(Some("frsky")), DEFAULT);
    }

    #[test]
    fn every_entry_has_text_and_unique_key() {
        let keys: Vec<&str> = ENTRIES.iter().map(|(key, _)| *key).collect();
        assert_eq!(keys.len(), 16);
        for (index, key) in keys.iter().enumerate() {
            assert!(!keys[index + 1..].contains(key), "duplicate key {key}");
            let description = lookup(Some(key));
            assert!(!description.title.is_empty());
            assert!(!description.body.is_empty());
        }
        assert!(keys.contains(&"FRSKY"));
        assert!((1..=4).all(|i| keys.contains(&format!("motor{i}").as_str())));
        assert!((1..=4).all(|i| keys.contains(&format!("prop{i}").as_str())));
    }
}
