//! Fixtures shared by the integration tests.
//!
//! The signing and verification cases are the BIP-340 reference test vectors 0 to 14.
#![allow(dead_code)]

use bip340_musig::RangeError;

/// One BIP-340 signing case. All fields are upper-case hex.
pub struct SignVector {
    pub secret_key: &'static str,
    pub public_key: &'static str,
    pub aux_rand: &'static str,
    pub message: &'static str,
    pub signature: &'static str,
}

/// What `verify_digest` must report for a [`VerifyVector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Valid,
    Invalid,
    /// Rejected with this range error before any curve arithmetic.
    OutOfRange(RangeError),
}

pub struct VerifyVector {
    pub index: usize,
    pub public_key: &'static str,
    pub message: &'static str,
    pub signature: &'static str,
    pub expected: Expected,
}

const PK_DFF1: &str = "DFF1D77F2A671C5F36183726DB2341BE58FEAE1DA2DECED843240F7B502BA659";
const MSG_243F: &str = "243F6A8885A308D313198A2E03707344A4093822299F31D0082EFA98EC4E6C89";

pub const BIP340_SIGN_VECTORS: [SignVector; 4] = [
    SignVector {
        secret_key: "0000000000000000000000000000000000000000000000000000000000000003",
        public_key: "F9308A019258C31049344F85F89D5229B531C845836F99B08601F113BCE036F9",
        aux_rand: "0000000000000000000000000000000000000000000000000000000000000000",
        message: "0000000000000000000000000000000000000000000000000000000000000000",
        signature: "E907831F80848D1069A5371B402410364BDF1C5F8307B0084C55F1CE2DCA8215\
                    25F66A4A85EA8B71E482A74F382D2CE5EBEEE8FDB2172F477DF4900D310536C0",
    },
    SignVector {
        secret_key: "B7E151628AED2A6ABF7158809CF4F3C762E7160F38B4DA56A784D9045190CFEF",
        public_key: PK_DFF1,
        aux_rand: "0000000000000000000000000000000000000000000000000000000000000001",
        message: MSG_243F,
        signature: "6896BD60EEAE296DB48A229FF71DFE071BDE413E6D43F917DC8DCF8C78DE3341\
                    8906D11AC976ABCCB20B091292BFF4EA897EFCB639EA871CFA95F6DE339E4B0A",
    },
    SignVector {
        secret_key: "C90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74020BBEA63B14E5C9",
        public_key: "DD308AFEC5777E13121FA72B9CC1B7CC0139715309B086C960E18FD969774EB8",
        aux_rand: "C87AA53824B4D7AE2EB035A2B5BBBCCC080E76CDC6D1692C4B0B62D798E6D906",
        message: "7E2D58D8B3BCDF1ABADEC7829054F90DDA9805AAB56C77333024B9D0A508B75C",
        signature: "5831AAEED7B44BB74E5EAB94BA9D4294C49BCF2A60728D8B4C200F50DD313C1B\
                    AB745879A5AD954A72C45A91C3A51D3C7ADEA98D82F8481E0E1E03674A6F3FB7",
    },
    SignVector {
        secret_key: "0B432B2677937381AEF05BB02A66ECD012773062CF3FA2549E44F58ED2401710",
        public_key: "25D1DFF95105F5253C4022F628A996AD3A0D95FBF21D468A1B33F8C160D8F517",
        aux_rand: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        message: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        signature: "7EB0509757E246F19449885651611CB965ECC1A187DD51B64FDA1EDC9637D5EC\
                    97582B9CB13DB3933705B32BA982AF5AF25FD78881EBB32771FC5922EFC66EA3",
    },
];

/// Verification-only cases 4 to 14. Cases 0 to 3 are the signing vectors.
pub const BIP340_VERIFY_VECTORS: [VerifyVector; 11] = [
    VerifyVector {
        index: 4,
        public_key: "D69C3509BB99E412E68B0FE8544E72837DFA30746D8BE2AA65975F29D22DC7B9",
        message: "4DF3C3F68FCC83B27E9D42C90431A72499F17875C81A599B566C9889B9696703",
        signature: "00000000000000000000003B78CE563F89A0ED9414F5AA28AD0D96D6795F9C63\
                    76AFB1548AF603B3EB45C9F8207DEE1060CB71C04E80F593060B07D28308D7F4",
        expected: Expected::Valid,
    },
    BIP340_KEY_NOT_ON_CURVE,
    VerifyVector {
        index: 6,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "FFF97BD5755EEEA420453A14355235D382F6472F8568A18B2F057A1460297556\
                    3CC27944640AC607CD107AE10923D9EF7A73C643E166BE5EBEAFA34B1AC553E2",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 7,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "1FA62E331EDBC21C394792D2AB1100A7B432B013DF3F6FF4F99FCB33E0E1515F\
                    28890B3EDB6E7189B630448B515CE4F8622A954CFE545735AAEA5134FCCDB2BD",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 8,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "6CFF5C3BA86C69EA4B7376F31A9BCB4F74C1976089B2D9963DA2E5543E177769\
                    961764B3AA9B2FFCB6EF947B6887A226E8D7C93E00C5ED0C1834FF0D0C2E6DA6",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 9,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "0000000000000000000000000000000000000000000000000000000000000000\
                    123DDA8328AF9C23A94C1FEECFD123BA4FB73476F0D594DCB65C6425BD186051",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 10,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "0000000000000000000000000000000000000000000000000000000000000001\
                    7615FBAF5AE28864013C099742DEADB4DBA87F11AC6754F93780D5A1837CF197",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 11,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "4A298DACAE57395A15D0795DDBFD1DCB564DA82B0F269BC70A74F8220429BA1D\
                    69E89B4C5564D00349106B8497785DD7D1D713A8AE82B32FA79D5F7FC407D39B",
        expected: Expected::Invalid,
    },
    VerifyVector {
        index: 12,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC2F\
                    69E89B4C5564D00349106B8497785DD7D1D713A8AE82B32FA79D5F7FC407D39B",
        expected: Expected::OutOfRange(RangeError::SignatureR),
    },
    VerifyVector {
        index: 13,
        public_key: PK_DFF1,
        message: MSG_243F,
        signature: "6CFF5C3BA86C69EA4B7376F31A9BCB4F74C1976089B2D9963DA2E5543E177769\
                    FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141",
        expected: Expected::OutOfRange(RangeError::SignatureS),
    },
    VerifyVector {
        index: 14,
        public_key: "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEFFFFFC30",
        message: MSG_243F,
        signature: "6CFF5C3BA86C69EA4B7376F31A9BCB4F74C1976089B2D9963DA2E5543E177769\
                    69E89B4C5564D00349106B8497785DD7D1D713A8AE82B32FA79D5F7FC407D39B",
        expected: Expected::OutOfRange(RangeError::PublicKey),
    },
];

/// Public key whose x-coordinate has no point on the curve (case 5).
pub const BIP340_KEY_NOT_ON_CURVE: VerifyVector = VerifyVector {
    index: 5,
    public_key: "EEFDEA4CDB677750A420FEE807EACF21EB9898AE79B9768766E4FAA04A2D4A34",
    message: MSG_243F,
    signature: "6CFF5C3BA86C69EA4B7376F31A9BCB4F74C1976089B2D9963DA2E5543E177769\
                69E89B4C5564D00349106B8497785DD7D1D713A8AE82B32FA79D5F7FC407D39B",
    expected: Expected::Invalid,
};

/// Seeds for deterministic signer sets.
pub const SIGNER_SEEDS: [&str; 8] = [
    "signer alpha",
    "signer bravo",
    "signer charlie",
    "signer delta",
    "signer echo",
    "signer foxtrot",
    "signer golf",
    "signer hotel",
];

pub fn decode<const N: usize>(hex_str: &str) -> [u8; N] {
    let bytes = hex::decode(hex_str).unwrap();
    bytes.try_into().unwrap()
}
