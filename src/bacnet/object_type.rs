// BACnet オブジェクトタイプ、プロパティ識別子、工学単位
// SPDX-License-Identifier: MPL-2.0
// SPDX-FileCopyrightText: 2025 Akihiro Yamamoto <github.com/ak1211>
//
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Debug)]
pub enum ObjectType {
    AnalogInput,
    AnalogOutput,
    AnalogValue,
    BinaryInput,
    BinaryOutput,
    BinaryValue,
    Device,
    MultiStateInput,
    MultiStateOutput,
    MultiStateValue,
    Other(u16),
}

impl ObjectType {
    /// 点リストに載せるオブジェクトタイプ
    pub const POINTS: [ObjectType; 9] = [
        Self::AnalogInput,
        Self::AnalogOutput,
        Self::AnalogValue,
        Self::BinaryInput,
        Self::BinaryOutput,
        Self::BinaryValue,
        Self::MultiStateInput,
        Self::MultiStateOutput,
        Self::MultiStateValue,
    ];

    pub fn code(&self) -> u16 {
        match self {
            Self::AnalogInput => 0,
            Self::AnalogOutput => 1,
            Self::AnalogValue => 2,
            Self::BinaryInput => 3,
            Self::BinaryOutput => 4,
            Self::BinaryValue => 5,
            Self::Device => 8,
            Self::MultiStateInput => 13,
            Self::MultiStateOutput => 14,
            Self::MultiStateValue => 19,
            Self::Other(n) => *n,
        }
    }

    /// 点リストの"object"列で使う名前 (analogInput など)
    pub fn name(&self) -> String {
        match self {
            Self::AnalogInput => "analogInput".to_string(),
            Self::AnalogOutput => "analogOutput".to_string(),
            Self::AnalogValue => "analogValue".to_string(),
            Self::BinaryInput => "binaryInput".to_string(),
            Self::BinaryOutput => "binaryOutput".to_string(),
            Self::BinaryValue => "binaryValue".to_string(),
            Self::Device => "device".to_string(),
            Self::MultiStateInput => "multiStateInput".to_string(),
            Self::MultiStateOutput => "multiStateOutput".to_string(),
            Self::MultiStateValue => "multiStateValue".to_string(),
            Self::Other(n) => format!("object{n}"),
        }
    }

    /// Mango の objectType 名
    pub fn mango_name(&self) -> Option<&'static str> {
        match self {
            Self::AnalogInput => Some("ANALOG_INPUT"),
            Self::AnalogOutput => Some("ANALOG_OUTPUT"),
            Self::AnalogValue => Some("ANALOG_VALUE"),
            Self::BinaryInput => Some("BINARY_INPUT"),
            Self::BinaryOutput => Some("BINARY_OUTPUT"),
            Self::BinaryValue => Some("BINARY_VALUE"),
            Self::MultiStateInput => Some("MULTISTATE_INPUT"),
            Self::MultiStateOutput => Some("MULTISTATE_OUTPUT"),
            Self::MultiStateValue => Some("MULTISTATE_VALUE"),
            _ => None,
        }
    }

    pub fn is_analog(&self) -> bool {
        matches!(
            self,
            Self::AnalogInput | Self::AnalogOutput | Self::AnalogValue
        )
    }

    pub fn is_binary(&self) -> bool {
        matches!(
            self,
            Self::BinaryInput | Self::BinaryOutput | Self::BinaryValue
        )
    }

    pub fn is_multistate(&self) -> bool {
        matches!(
            self,
            Self::MultiStateInput | Self::MultiStateOutput | Self::MultiStateValue
        )
    }
}

impl From<u16> for ObjectType {
    fn from(code: u16) -> Self {
        match code {
            0 => Self::AnalogInput,
            1 => Self::AnalogOutput,
            2 => Self::AnalogValue,
            3 => Self::BinaryInput,
            4 => Self::BinaryOutput,
            5 => Self::BinaryValue,
            8 => Self::Device,
            13 => Self::MultiStateInput,
            14 => Self::MultiStateOutput,
            19 => Self::MultiStateValue,
            n => Self::Other(n),
        }
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analogInput" | "analog-input" => Ok(Self::AnalogInput),
            "analogOutput" | "analog-output" => Ok(Self::AnalogOutput),
            "analogValue" | "analog-value" => Ok(Self::AnalogValue),
            "binaryInput" | "binary-input" => Ok(Self::BinaryInput),
            "binaryOutput" | "binary-output" => Ok(Self::BinaryOutput),
            "binaryValue" | "binary-value" => Ok(Self::BinaryValue),
            "device" => Ok(Self::Device),
            "multiStateInput" | "multi-state-input" => Ok(Self::MultiStateInput),
            "multiStateOutput" | "multi-state-output" => Ok(Self::MultiStateOutput),
            "multiStateValue" | "multi-state-value" => Ok(Self::MultiStateValue),
            _ => Err(format!("unknown object type \"{s}\"")),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// プロパティ識別子
pub mod property {
    pub const ACTIVE_TEXT: u32 = 4;
    pub const APPLICATION_SOFTWARE_VERSION: u32 = 12;
    pub const DESCRIPTION: u32 = 28;
    pub const FIRMWARE_REVISION: u32 = 44;
    pub const INACTIVE_TEXT: u32 = 46;
    pub const LOCATION: u32 = 58;
    pub const MODEL_NAME: u32 = 70;
    pub const OBJECT_LIST: u32 = 76;
    pub const OBJECT_NAME: u32 = 77;
    pub const PRESENT_VALUE: u32 = 85;
    pub const STATE_TEXT: u32 = 110;
    pub const UNITS: u32 = 117;
    pub const VENDOR_NAME: u32 = 121;
    pub const SERIAL_NUMBER: u32 = 372;
}

/// 工学単位の名前
pub fn engineering_units(code: u32) -> String {
    const UNITS: [&str; 105] = [
        "squareMeters",
        "squareFeet",
        "milliamperes",
        "amperes",
        "ohms",
        "volts",
        "kilovolts",
        "megavolts",
        "voltAmperes",
        "kilovoltAmperes",
        "megavoltAmperes",
        "voltAmperesReactive",
        "kilovoltAmperesReactive",
        "megavoltAmperesReactive",
        "degreesPhase",
        "powerFactor",
        "joules",
        "kilojoules",
        "wattHours",
        "kilowattHours",
        "btus",
        "therms",
        "tonHours",
        "joulesPerKilogramDryAir",
        "btusPerPoundDryAir",
        "cyclesPerHour",
        "cyclesPerMinute",
        "hertz",
        "gramsOfWaterPerKilogramDryAir",
        "percentRelativeHumidity",
        "millimeters",
        "meters",
        "inches",
        "feet",
        "wattsPerSquareFoot",
        "wattsPerSquareMeter",
        "lumens",
        "luxes",
        "footCandles",
        "kilograms",
        "poundsMass",
        "tons",
        "kilogramsPerSecond",
        "kilogramsPerMinute",
        "kilogramsPerHour",
        "poundsMassPerMinute",
        "poundsMassPerHour",
        "watts",
        "kilowatts",
        "megawatts",
        "btusPerHour",
        "horsepower",
        "tonsRefrigeration",
        "pascals",
        "kilopascals",
        "bars",
        "poundsForcePerSquareInch",
        "centimetersOfWater",
        "inchesOfWater",
        "millimetersOfMercury",
        "centimetersOfMercury",
        "inchesOfMercury",
        "degreesCelsius",
        "degreesKelvin",
        "degreesFahrenheit",
        "degreeDaysCelsius",
        "degreeDaysFahrenheit",
        "years",
        "months",
        "weeks",
        "days",
        "hours",
        "minutes",
        "seconds",
        "metersPerSecond",
        "kilometersPerHour",
        "feetPerSecond",
        "feetPerMinute",
        "milesPerHour",
        "cubicFeet",
        "cubicMeters",
        "imperialGallons",
        "liters",
        "usGallons",
        "cubicFeetPerMinute",
        "cubicMetersPerSecond",
        "imperialGallonsPerMinute",
        "litersPerSecond",
        "litersPerMinute",
        "usGallonsPerMinute",
        "degreesAngular",
        "degreesCelsiusPerHour",
        "degreesCelsiusPerMinute",
        "degreesFahrenheitPerHour",
        "degreesFahrenheitPerMinute",
        "noUnits",
        "partsPerMillion",
        "partsPerBillion",
        "percent",
        "percentPerSecond",
        "perMinute",
        "perSecond",
        "psiPerDegreeFahrenheit",
        "radians",
        "revolutionsPerMinute",
    ];
    UNITS
        .get(code as usize)
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("units({code})"))
}

#[test]
fn test1() {
    for t in ObjectType::POINTS {
        assert_eq!(ObjectType::from(t.code()), t);
        assert_eq!(t.name().parse::<ObjectType>(), Ok(t));
        assert!(t.mango_name().is_some());
    }
    assert_eq!(ObjectType::from(20), ObjectType::Other(20));
    assert_eq!(ObjectType::Device.mango_name(), None);
    assert!("trendLog".parse::<ObjectType>().is_err());
}

#[test]
fn test2() {
    assert_eq!(engineering_units(62), "degreesCelsius");
    assert_eq!(engineering_units(98), "percent");
    assert_eq!(engineering_units(104), "revolutionsPerMinute");
    assert_eq!(engineering_units(9999), "units(9999)");
}
