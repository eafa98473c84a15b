//! The GET UID command APDU and its response.
//!
//! Only one command is modeled: the PC/SC pseudo-APDU `FF CA 00 00 00`
//! which asks a contactless reader for the UID of the card in its field.

use badgetap_core::constants::{
    GET_UID_CLA, GET_UID_INS, GET_UID_LE, GET_UID_P1, GET_UID_P2, SW_SUCCESS,
};

/// A case-2 short command APDU (header plus expected length, no data).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduCommand {
    /// Class byte (CLA).
    pub cla: u8,
    /// Instruction byte (INS).
    pub ins: u8,
    /// Parameter 1 (P1).
    pub p1: u8,
    /// Parameter 2 (P2).
    pub p2: u8,
    /// Expected response length (Le). `0` means "as much as available".
    pub le: u8,
}

/// The GET UID command.
pub const GET_UID: ApduCommand = ApduCommand {
    cla: GET_UID_CLA,
    ins: GET_UID_INS,
    p1: GET_UID_P1,
    p2: GET_UID_P2,
    le: GET_UID_LE,
};

impl ApduCommand {
    /// Encode the command as sent to the driver.
    ///
    /// # Examples
    ///
    /// ```
    /// use badgetap_hardware::apdu::GET_UID;
    ///
    /// assert_eq!(GET_UID.to_bytes(), [0xFF, 0xCA, 0x00, 0x00, 0x00]);
    /// ```
    pub fn to_bytes(&self) -> [u8; 5] {
        [self.cla, self.ins, self.p1, self.p2, self.le]
    }
}

/// Response to a command APDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data without the status word.
    pub data: Vec<u8>,
    /// Status word (SW1 SW2).
    pub status_word: u16,
}

impl ApduResponse {
    /// Split a raw response buffer into data and status word.
    ///
    /// The last two bytes are the status word. A buffer shorter than two
    /// bytes carries no data and status word `0x0000`.
    ///
    /// # Examples
    ///
    /// ```
    /// use badgetap_hardware::apdu::ApduResponse;
    ///
    /// let response = ApduResponse::parse(&[0x04, 0xA1, 0xB2, 0xC3, 0x90, 0x00]);
    /// assert_eq!(response.data, vec![0x04, 0xA1, 0xB2, 0xC3]);
    /// assert!(response.is_success());
    /// ```
    pub fn parse(raw: &[u8]) -> Self {
        match raw.len() {
            0 | 1 => Self {
                data: Vec::new(),
                status_word: 0,
            },
            len => Self {
                data: raw[..len - 2].to_vec(),
                status_word: u16::from_be_bytes([raw[len - 2], raw[len - 1]]),
            },
        }
    }

    /// Check if the response carries any data.
    pub fn has_data(&self) -> bool {
        !self.data.is_empty()
    }

    /// Check if the status word reports success (`90 00`).
    pub fn is_success(&self) -> bool {
        self.status_word == SW_SUCCESS
    }

    /// Status word byte 1.
    pub fn sw1(&self) -> u8 {
        (self.status_word >> 8) as u8
    }

    /// Status word byte 2.
    pub fn sw2(&self) -> u8 {
        self.status_word as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_get_uid_encoding() {
        assert_eq!(GET_UID.to_bytes(), [0xFF, 0xCA, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_parse_uid_response() {
        let response = ApduResponse::parse(&[0x04, 0xA1, 0xB2, 0xC3, 0x90, 0x00]);
        assert_eq!(response.data, vec![0x04, 0xA1, 0xB2, 0xC3]);
        assert_eq!(response.status_word, 0x9000);
        assert_eq!(response.sw1(), 0x90);
        assert_eq!(response.sw2(), 0x00);
        assert!(response.has_data());
    }

    #[test]
    fn test_parse_error_status_without_data() {
        let response = ApduResponse::parse(&[0x63, 0x00]);
        assert!(!response.has_data());
        assert!(!response.is_success());
        assert_eq!(response.status_word, 0x6300);
    }

    #[rstest]
    #[case(&[])]
    #[case(&[0x90])]
    fn test_parse_truncated(#[case] raw: &[u8]) {
        let response = ApduResponse::parse(raw);
        assert!(!response.has_data());
        assert_eq!(response.status_word, 0);
    }
}
